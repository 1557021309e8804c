use axum::extract::{Json, State};

use crate::{
    AppState,
    cache::keys::product_key,
    error::AppError,
    utils::{ApiResponse, success_to_api_response},
};

use super::model::{Product, ProductRequest};

#[axum::debug_handler]
pub async fn get_product_data(
    State(state): State<AppState>,
    Json(req): Json<ProductRequest>,
) -> Result<Json<ApiResponse<Product>>, AppError> {
    if req.id <= 0 {
        return Err(AppError::Validation("商品ID无效".to_string()));
    }

    let pool = state.pool.clone();
    let product = state
        .cache
        .fetch_or_compute(&product_key(req.id), state.config.cache_policy(), || async move {
            Product::find_by_long_id(&pool, req.id).await
        })
        .await?;

    Ok(success_to_api_response(product))
}
