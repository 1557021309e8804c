use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};

use crate::{
    AppState,
    middleware::{RouteLimit, auth_middleware, log_errors, rate_limit},
    routes,
};

// 创建主路由
//
// 每个路由先限流再鉴权：鉴权失败的请求也计入限流。
pub fn create_router(state: AppState) -> Router {
    let limits = state.config.rate_limits;
    let limiter = &state.limiter;

    Router::new()
        .route(
            "/getProductData",
            post(routes::product::get_product_data).layer(from_fn_with_state(
                RouteLimit::new(limiter.clone(), "getProductData", limits.product),
                rate_limit,
            )),
        )
        .route(
            "/getwishlist",
            post(routes::wishlist::get_wishlist)
                .layer(from_fn_with_state(state.clone(), auth_middleware))
                .layer(from_fn_with_state(
                    RouteLimit::new(limiter.clone(), "getWishlist", limits.wishlist),
                    rate_limit,
                )),
        )
        .route(
            "/getCertainWishlist",
            post(routes::wishlist::get_certain_wishlist)
                .layer(from_fn_with_state(state.clone(), auth_middleware))
                .layer(from_fn_with_state(
                    RouteLimit::new(limiter.clone(), "getCertainWishlist", limits.wishlist_page),
                    rate_limit,
                )),
        )
        .route("/health", get(routes::health::health))
        .layer(from_fn(log_errors))
        .with_state(state)
}
