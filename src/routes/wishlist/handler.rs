use axum::extract::{Extension, Json, State};

use crate::{
    AppState,
    cache::keys::{page_field, wishlist_key, wishlist_page_key},
    error::AppError,
    utils::{ApiResponse, Claims, success_to_api_response},
};

use super::model::{WishlistItem, WishlistOverview, WishlistPageRequest, WishlistPageResponse};

#[axum::debug_handler]
pub async fn get_wishlist(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<WishlistOverview>>, AppError> {
    let pool = state.pool.clone();
    let overview = state
        .cache
        .fetch_or_compute(&wishlist_key(claims.id), state.config.cache_policy(), || async move {
            WishlistOverview::find_by_user(&pool, claims.id).await
        })
        .await?;

    Ok(success_to_api_response(overview))
}

#[axum::debug_handler]
pub async fn get_certain_wishlist(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<WishlistPageRequest>,
) -> Result<Json<ApiResponse<WishlistPageResponse>>, AppError> {
    if req.wishlist_id < 1 || req.page_number < 1 || req.wishlist_name.trim().is_empty() {
        return Err(AppError::Validation("必填字段为空".to_string()));
    }

    let pool = state.pool.clone();
    let (wishlist_id, page_number) = (req.wishlist_id, req.page_number);
    let data = state
        .cache
        .fetch_field_or_compute(
            &wishlist_page_key(claims.id, wishlist_id),
            &page_field(page_number),
            state.config.cache_policy().ttl,
            || async move {
                WishlistItem::find_page(&pool, claims.id, wishlist_id, page_number)
                    .await
                    .map(Some)
            },
        )
        .await?;

    Ok(success_to_api_response(WishlistPageResponse {
        data,
        wishlist_id,
        wishlist_name: req.wishlist_name,
        page_number,
    }))
}
