use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::utils::{error_codes, error_to_api_response};

/// 键值存储往返错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("keyed store timed out after {0:?}")]
    Timeout(Duration),

    #[error("keyed store unavailable")]
    Unavailable,

    #[error("ttl must be at least one second, got {0:?}")]
    InvalidTtl(Duration),

    #[error("operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("value is not an integer")]
    NotAnInteger,

    #[error("failed to encode value: {0}")]
    Codec(#[from] crate::cache::codec::CodecError),

    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}

/// 读穿缓存的结果错误：后端没有记录，或者后端查询本身失败
#[derive(Debug, Error)]
pub enum ReadThroughError<E> {
    #[error("record not found in backing store")]
    NotFound,

    #[error(transparent)]
    Backing(E),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("未授权访问")]
    Unauthorized,

    #[error("记录不存在")]
    NotFound,

    #[error("请求过于频繁，请在{retry_after_secs}秒后重试")]
    RateLimited { retry_after_secs: i64 },

    #[error("数据库错误")]
    Database(#[from] sqlx::Error),
}

#[derive(Serialize)]
struct RateLimitedBody {
    #[serde(rename = "waitForSeconds")]
    wait_for_seconds: i64,
}

impl From<ReadThroughError<sqlx::Error>> for AppError {
    fn from(err: ReadThroughError<sqlx::Error>) -> Self {
        match err {
            ReadThroughError::NotFound => AppError::NotFound,
            ReadThroughError::Backing(e) => AppError::Database(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Database(e) = &self {
            tracing::error!(error = %e, "Database query failed");
        }

        let msg = self.to_string();
        match self {
            AppError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                error_to_api_response::<()>(error_codes::VALIDATION_ERROR, msg),
            )
                .into_response(),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                error_to_api_response::<()>(error_codes::AUTH_FAILED, msg),
            )
                .into_response(),
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                error_to_api_response::<()>(error_codes::NOT_FOUND, msg),
            )
                .into_response(),
            AppError::RateLimited { retry_after_secs } => {
                let mut body = error_to_api_response::<RateLimitedBody>(error_codes::RATE_LIMIT, msg);
                body.resp_data = Some(RateLimitedBody {
                    wait_for_seconds: retry_after_secs,
                });
                (StatusCode::TOO_MANY_REQUESTS, body).into_response()
            }
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response::<()>(error_codes::INTERNAL_ERROR, msg),
            )
                .into_response(),
        }
    }
}
