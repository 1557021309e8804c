use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::{
    cache::{RateDecision, RateLimiter, RatePolicy},
    error::AppError,
};

/// 单个路由的限流配置：接口名决定计数器键，策略决定阈值和窗口
#[derive(Clone)]
pub struct RouteLimit {
    limiter: RateLimiter,
    action: &'static str,
    policy: RatePolicy,
}

impl RouteLimit {
    pub fn new(limiter: RateLimiter, action: &'static str, policy: RatePolicy) -> Self {
        Self {
            limiter,
            action,
            policy,
        }
    }
}

/// 调用方身份：优先 X-Real-IP，其次 X-Forwarded-For 第一个非空值，最后降级为连接 IP
pub fn client_ip(req: &Request<Body>) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    req.headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

pub async fn rate_limit(
    State(limit): State<RouteLimit>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&req);

    match limit.limiter.check(&ip, limit.action, limit.policy).await {
        RateDecision::Allowed { count } => {
            tracing::debug!(ip = %ip, action = limit.action, count, "rate limit passed");
            next.run(req).await
        }
        RateDecision::Rejected { retry_after_secs } => {
            tracing::info!(ip = %ip, action = limit.action, retry_after_secs, "rate limit exceeded");
            AppError::RateLimited { retry_after_secs }.into_response()
        }
    }
}
