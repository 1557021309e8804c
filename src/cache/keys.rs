/// 商品详情缓存键前缀
const PRODUCT_PREFIX: &str = "product-";

/// 用户收藏夹概览缓存键前缀
const WISHLIST_PREFIX: &str = "wishlist-";

/// 单个收藏夹分页缓存键前缀（哈希，字段为页码）
const WISHLIST_PAGE_PREFIX: &str = "wishlist-page-";

/// 限流计数器键前缀
const RATE_LIMIT_PREFIX: &str = "rate-limit-";

pub fn product_key(product_id: i64) -> String {
    format!("{}{}", PRODUCT_PREFIX, product_id)
}

pub fn wishlist_key(user_id: i64) -> String {
    format!("{}{}", WISHLIST_PREFIX, user_id)
}

pub fn wishlist_page_key(user_id: i64, wishlist_id: i64) -> String {
    format!("{}{}-{}", WISHLIST_PAGE_PREFIX, user_id, wishlist_id)
}

pub fn page_field(page: u32) -> String {
    format!("page-{}", page)
}

/// 生成限流计数器键，调用方身份（IP）加接口名
pub fn rate_limit_key(caller: &str, action: &str) -> String {
    format!("{}{}-{}", RATE_LIMIT_PREFIX, caller, action)
}
