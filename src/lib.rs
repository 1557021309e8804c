use cache::{CacheAccessor, KeyedStore, RateLimiter};
use config::Config;
use sqlx::PgPool;

pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub cache: CacheAccessor,
    pub limiter: RateLimiter,
}

impl AppState {
    /// 缓存访问器和限流器共享同一个存储客户端
    pub fn new(pool: PgPool, config: Config, store: KeyedStore) -> Self {
        Self {
            pool,
            cache: CacheAccessor::new(store.clone()),
            limiter: RateLimiter::new(store, config.rate_limit_mode),
            config,
        }
    }
}
