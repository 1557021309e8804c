mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use shop_backend::{
    cache::{KeyedStore, RateDecision, RateLimitMode, RateLimiter, RatePolicy, RateWindow},
    config::{Config, RatePolicies},
    router::create_router,
};
use tower::ServiceExt;

use common::{body_json, post_json, test_config, test_state};

/// 接口处的调用约定：先读，超过阈值就拒绝，否则计数加一并重置窗口
async fn call(limiter: &RateLimiter, policy: RatePolicy) -> Result<u32, i64> {
    let (count, remaining) = limiter.get_rate("203.0.113.9", "getProductData").await.as_pair();
    if count >= policy.threshold {
        return Err(remaining);
    }
    limiter
        .set_rate("203.0.113.9", "getProductData", count + 1, policy.window)
        .await
        .unwrap();
    Ok(count + 1)
}

#[tokio::test(start_paused = true)]
async fn third_call_in_window_is_rejected_until_window_lapses() {
    let limiter = RateLimiter::new(KeyedStore::memory(), RateLimitMode::Fixed);
    let policy = RatePolicy::new(2, 60);

    assert_eq!(call(&limiter, policy).await, Ok(1));
    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(call(&limiter, policy).await, Ok(2));
    tokio::time::advance(Duration::from_secs(5)).await;

    let remaining = call(&limiter, policy).await.unwrap_err();
    assert!((1..=60).contains(&remaining), "remaining = {remaining}");

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(limiter.get_rate("203.0.113.9", "getProductData").await, RateWindow::Unset);
    assert_eq!(call(&limiter, policy).await, Ok(1));
}

#[tokio::test(start_paused = true)]
async fn check_follows_the_same_contract() {
    let limiter = RateLimiter::new(KeyedStore::memory(), RateLimitMode::Fixed);
    let policy = RatePolicy::new(2, 60);

    assert_eq!(limiter.check("ip", "login", policy).await, RateDecision::Allowed { count: 1 });
    assert_eq!(limiter.check("ip", "login", policy).await, RateDecision::Allowed { count: 2 });
    assert_eq!(
        limiter.check("ip", "login", policy).await,
        RateDecision::Rejected { retry_after_secs: 60 }
    );
    // 被拒绝的调用不写计数，也不重置窗口
    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(
        limiter.check("ip", "login", policy).await,
        RateDecision::Rejected { retry_after_secs: 30 }
    );

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(limiter.check("ip", "login", policy).await, RateDecision::Allowed { count: 1 });
}

fn limited_config(mode: RateLimitMode) -> Config {
    Config {
        rate_limit_mode: mode,
        rate_limits: RatePolicies {
            product: RatePolicy::new(2, 60),
            ..RatePolicies::default()
        },
        ..test_config()
    }
}

#[tokio::test(start_paused = true)]
async fn route_returns_429_with_wait_time() {
    for mode in [RateLimitMode::Fixed, RateLimitMode::Atomic] {
        let (state, _) = test_state(limited_config(mode));
        let app = create_router(state);
        // id 为 0 的请求在处理函数里被拒绝，不会访问数据库，但会先经过限流
        let request = || post_json("/getProductData", "198.51.100.7", json!({ "id": 0 }));

        for _ in 0..2 {
            let response = app.clone().oneshot(request()).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }

        let response = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(body["code"], 1005);
        assert_eq!(body["resp_data"]["waitForSeconds"], 60);

        // 其他调用方不受影响
        let other = post_json("/getProductData", "198.51.100.8", json!({ "id": 0 }));
        let response = app.clone().oneshot(other).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        tokio::time::advance(Duration::from_secs(61)).await;
        let response = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn store_outage_never_blocks_requests() {
    let (state, memory) = test_state(limited_config(RateLimitMode::Fixed));
    memory.set_offline(true);
    let app = create_router(state);

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(post_json("/getProductData", "198.51.100.9", json!({ "id": 0 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn health_reports_store_state() {
    let (state, memory) = test_state(test_config());
    let app = create_router(state);
    let get = || {
        axum::http::Request::builder()
            .uri("/health")
            .body(axum::body::Body::empty())
            .unwrap()
    };

    let body = body_json(app.clone().oneshot(get()).await.unwrap()).await;
    assert_eq!(body["resp_data"]["store"], "memory");
    assert_eq!(body["resp_data"]["store_ok"], true);

    memory.set_offline(true);
    let body = body_json(app.oneshot(get()).await.unwrap()).await;
    assert_eq!(body["resp_data"]["store_ok"], false);
}
