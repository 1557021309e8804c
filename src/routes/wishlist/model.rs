use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, types::Json};

/// 每个收藏夹在概览和分页中返回的条目数
pub const WISHLIST_PAGE_SIZE: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub title: String,
    #[serde(rename = "wishListId")]
    pub wishlist_id: i32,
    #[serde(rename = "parentWishListId")]
    pub parent_wishlist_id: i32,
    pub selected_image_url: String,
    pub product_id: i32,
    pub long_product_id: i64,
    #[serde(rename = "wishListName")]
    pub wishlist_name: String,
    pub min_price: f32,
    pub max_price: f32,
}

/// 用户所有收藏夹的概览，`wishlist-<user_id>` 缓存键下保存的结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistOverview {
    #[serde(rename = "wishListNames")]
    pub wishlist_names: Vec<String>,
    #[serde(rename = "wishListIds")]
    pub wishlist_ids: Vec<i32>,
    /// 收藏夹名 -> 最近加入的商品，空收藏夹不出现
    #[serde(rename = "wishListData")]
    pub wishlist_data: BTreeMap<String, Vec<WishlistItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistPageRequest {
    pub wishlist_id: i64,
    pub wishlist_name: String,
    pub page_number: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistPageResponse {
    pub data: Vec<WishlistItem>,
    pub wishlist_id: i64,
    pub wishlist_name: String,
    pub page_number: u32,
}

const ITEM_COLUMNS: &str = r#"
    t_titles.title AS title,
    t_wishlist_products.id::INT AS wishlist_id,
    t_wishlist_products.foreign_wishlist_id::INT AS parent_wishlist_id,
    t_wishlist_products.selectedimageurl AS selected_image_url,
    t_wishlist_products.foreign_product_id::INT AS product_id,
    t_productid.myproductid::BIGINT AS long_product_id,
    t_wishlist.wishlistname AS wishlist_name,
    t_basicinfo.minprice::REAL AS min_price,
    t_basicinfo.maxprice::REAL AS max_price
"#;

const ITEM_JOINS: &str = r#"
    FROM shop.t_wishlist_products
    JOIN shop.t_wishlist ON t_wishlist.id = t_wishlist_products.foreign_wishlist_id
    JOIN shop.t_productid ON t_productid.id = t_wishlist_products.foreign_product_id
    JOIN shop.t_titles ON t_titles.foreign_id = t_wishlist_products.foreign_product_id
    JOIN shop.t_basicinfo ON t_basicinfo.foreign_id = t_wishlist_products.foreign_product_id
"#;

impl WishlistOverview {
    /// 查询用户的收藏夹列表及每个收藏夹最近的商品；用户没有任何收藏夹时返回 `None`
    pub async fn find_by_user(pool: &PgPool, user_id: i64) -> Result<Option<Self>, sqlx::Error> {
        let lists = sqlx::query_as::<_, (Json<Vec<String>>, Json<Vec<i32>>)>(
            r#"
            SELECT json_agg(wishlistname ORDER BY id), json_agg(id ORDER BY id)
            FROM shop.t_wishlist
            WHERE foreign_user_id = $1
            GROUP BY foreign_user_id
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        let Some((Json(wishlist_names), Json(wishlist_ids))) = lists else {
            return Ok(None);
        };

        let query = format!(
            "SELECT {ITEM_COLUMNS} {ITEM_JOINS}
            WHERE t_wishlist_products.foreign_wishlist_id = $1
            ORDER BY t_wishlist_products.created_at DESC
            LIMIT $2"
        );

        let mut wishlist_data = BTreeMap::new();
        for (name, id) in wishlist_names.iter().zip(&wishlist_ids) {
            let items = sqlx::query_as::<_, WishlistItem>(&query)
                .bind(*id)
                .bind(WISHLIST_PAGE_SIZE)
                .fetch_all(pool)
                .await?;
            if !items.is_empty() {
                wishlist_data.insert(name.clone(), items);
            }
        }

        Ok(Some(Self {
            wishlist_names,
            wishlist_ids,
            wishlist_data,
        }))
    }
}

impl WishlistItem {
    /// 分页查询某个收藏夹的商品，只返回属于该用户的收藏夹
    pub async fn find_page(
        pool: &PgPool,
        user_id: i64,
        wishlist_id: i64,
        page_number: u32,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let offset = WISHLIST_PAGE_SIZE * (i64::from(page_number.max(1)) - 1);
        let query = format!(
            "SELECT {ITEM_COLUMNS} {ITEM_JOINS}
            WHERE t_wishlist.foreign_user_id = $1
              AND t_wishlist_products.foreign_wishlist_id = $2
            ORDER BY t_wishlist_products.created_at DESC
            LIMIT $3 OFFSET $4"
        );

        sqlx::query_as::<_, WishlistItem>(&query)
            .bind(user_id)
            .bind(wishlist_id)
            .bind(WISHLIST_PAGE_SIZE)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
