#![allow(dead_code)]

use axum::{
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use shop_backend::{
    AppState,
    cache::{KeyedStore, MemoryStore},
    config::Config,
    utils::Claims,
};
use sqlx::postgres::PgPoolOptions;

pub const JWT_SECRET: &str = "test-secret";

/// 使用进程内存储的应用状态；数据库连接池惰性创建，命中缓存的路径不会触发连接
pub fn test_state(config: Config) -> (AppState, MemoryStore) {
    let memory = MemoryStore::default();
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database_url)
        .expect("lazy pool");
    let state = AppState::new(pool, config, KeyedStore::Memory(memory.clone()));
    (state, memory)
}

pub fn test_config() -> Config {
    Config {
        jwt_secret: JWT_SECRET.into(),
        ..Config::default()
    }
}

pub fn token_for(user_id: i64) -> String {
    encode(
        &Header::default(),
        &Claims {
            id: user_id,
            exp: 4_102_444_800,
        },
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("sign token")
}

pub fn post_json(uri: &str, ip: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-real-ip", ip)
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn sample_product(long_product_id: i64) -> Value {
    json!({
        "_display": true,
        "link": format!("https://shop.example/p/{long_product_id}"),
        "minPrice": 9.5,
        "maxPrice": 12.25,
        "discountNumber": 10.0,
        "discount": "10%",
        "minPrice_AfterDiscount": 8.5,
        "maxPrice_AfterDiscount": 11.0,
        "multiUnitName": "pieces",
        "oddUnitName": "piece",
        "maxPurchaseLimit": 3,
        "buyLimitText": "3 per customer",
        "quantityAvaliable": 120,
        "comingSoon": false,
        "productId": 1,
        "longProductId": long_product_id,
        "title": "Desk lamp",
        "images": ["a.jpg", "b.jpg"],
        "sizesColors": [{"color": "black"}],
        "priceList_InNames": {},
        "priceList_InNumbers": {},
        "priceList_Data": [],
        "specs": {"watts": 40},
        "shipping": {"days": 3},
        "modified_description_content": "<p>lamp</p>"
    })
}
