use axum::{extract::State, http::StatusCode};
use serde::Serialize;

use crate::{
    AppState,
    utils::{ApiResponse, success_to_api_response},
};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub store: &'static str,
    pub store_ok: bool,
}

/// 键值存储不可用时仍返回 200，只在 `store_ok` 中标记
pub async fn health(State(state): State<AppState>) -> (StatusCode, axum::Json<ApiResponse<HealthResponse>>) {
    let store = state.cache.store();
    let store_ok = match store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Keyed store ping failed");
            false
        }
    };

    (
        StatusCode::OK,
        success_to_api_response(HealthResponse {
            store: store.backend_name(),
            store_ok,
        }),
    )
}
