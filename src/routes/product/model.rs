use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub id: i64,
}

/// 商品详情，同时也是 `product-<id>` 缓存键下保存的结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_display")]
    pub display: bool,
    pub link: String,
    pub min_price: f32,
    pub max_price: f32,
    pub discount_number: f32,
    pub discount: String,
    #[serde(rename = "minPrice_AfterDiscount")]
    pub min_price_after_discount: f32,
    #[serde(rename = "maxPrice_AfterDiscount")]
    pub max_price_after_discount: f32,
    pub multi_unit_name: String,
    pub odd_unit_name: String,
    pub max_purchase_limit: i32,
    pub buy_limit_text: String,
    pub quantity_avaliable: i32,
    pub coming_soon: bool,
    pub product_id: i32,
    pub long_product_id: i64,
    pub title: String,
    pub images: serde_json::Value,
    pub sizes_colors: serde_json::Value,
    #[serde(rename = "priceList_InNames")]
    pub price_list_in_names: serde_json::Value,
    #[serde(rename = "priceList_InNumbers")]
    pub price_list_in_numbers: serde_json::Value,
    #[serde(rename = "priceList_Data")]
    pub price_list_data: serde_json::Value,
    pub specs: serde_json::Value,
    pub shipping: serde_json::Value,
    #[serde(rename = "modified_description_content")]
    pub modified_description_content: String,
}

impl Product {
    /// 按长商品ID查询，找不到时返回 `None`
    pub async fn find_by_long_id(
        pool: &PgPool,
        long_product_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Product>(
            r#"
            SELECT
                t_basicinfo.display AS display,
                t_basicinfo.product_link AS link,
                t_basicinfo.minprice::REAL AS min_price,
                t_basicinfo.maxprice::REAL AS max_price,
                t_basicinfo.discountnumber::REAL AS discount_number,
                t_basicinfo.discount AS discount,
                t_basicinfo.minprice_afterdiscount::REAL AS min_price_after_discount,
                t_basicinfo.maxprice_afterdiscount::REAL AS max_price_after_discount,
                t_basicinfo.multiunitname AS multi_unit_name,
                t_basicinfo.oddunitname AS odd_unit_name,
                t_basicinfo.maxpurchaselimit::INT AS max_purchase_limit,
                t_basicinfo.buylimittext AS buy_limit_text,
                t_basicinfo.quantityavaliable::INT AS quantity_avaliable,
                t_basicinfo.comingsoon AS coming_soon,
                t_productid.id::INT AS product_id,
                t_productid.myproductid::BIGINT AS long_product_id,
                t_titles.title AS title,
                t_mainimages.image_link_array::JSONB AS images,
                t_properties.property_array::JSONB AS sizes_colors,
                t_pricelist.byname::JSONB AS price_list_in_names,
                t_pricelist.bynumber::JSONB AS price_list_in_numbers,
                t_pricelist.bydata::JSONB AS price_list_data,
                t_specs.specs::JSONB AS specs,
                t_shippingdetails.shipping::JSONB AS shipping,
                t_modifieddescription.description AS modified_description_content
            FROM shop.t_productid
            JOIN shop.t_basicinfo ON t_basicinfo.foreign_id = t_productid.id
            JOIN shop.t_titles ON t_titles.foreign_id = t_productid.id
            JOIN shop.t_mainimages ON t_mainimages.foreign_id = t_productid.id
            JOIN shop.t_properties ON t_properties.foreign_id = t_productid.id
            JOIN shop.t_pricelist ON t_pricelist.foreign_id = t_productid.id
            JOIN shop.t_specs ON t_specs.foreign_id = t_productid.id
            JOIN shop.t_shippingdetails ON t_shippingdetails.foreign_id = t_productid.id
            JOIN shop.t_modifieddescription ON t_modifieddescription.foreign_id = t_productid.id
            WHERE t_productid.myproductid = $1
            "#,
        )
        .bind(long_product_id)
        .fetch_optional(pool)
        .await
    }
}
