use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{CachePolicy, RateLimitMode, RatePolicy};

/// 各接口的限流策略
#[derive(Debug, Clone, Copy)]
pub struct RatePolicies {
    pub product: RatePolicy,
    pub wishlist: RatePolicy,
    pub wishlist_page: RatePolicy,
}

impl Default for RatePolicies {
    fn default() -> Self {
        Self {
            product: RatePolicy::new(50, 300),
            wishlist: RatePolicy::new(10, 60),
            wishlist_page: RatePolicy::new(10, 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub redis_url: String,
    pub store_timeout_ms: u64,
    pub jwt_secret: String,
    pub server_host: String,
    pub server_port: u16,
    pub cache_ttl_secs: u64,
    pub cache_refresh_ttl_secs: u64,
    pub rate_limit_mode: RateLimitMode,
    pub rate_limits: RatePolicies,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "postgres://postgres@localhost:5432/shop".into(),
            db_max_connections: 10,
            redis_url: "redis://127.0.0.1:6379".into(),
            store_timeout_ms: 250,
            jwt_secret: String::new(),
            server_host: "0.0.0.0".into(),
            server_port: 8080,
            cache_ttl_secs: 20,
            cache_refresh_ttl_secs: 20,
            rate_limit_mode: RateLimitMode::Fixed,
            rate_limits: RatePolicies::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let defaults = Self::default();
        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            db_max_connections: optional("DB_MAX_CONNECTIONS", defaults.db_max_connections),
            store_timeout_ms: positive("STORE_TIMEOUT_MS", defaults.store_timeout_ms),
            server_host: optional("SERVER_HOST", defaults.server_host),
            server_port: optional("SERVER_PORT", defaults.server_port),
            cache_ttl_secs: positive("CACHE_TTL_SECS", defaults.cache_ttl_secs),
            cache_refresh_ttl_secs: positive(
                "CACHE_REFRESH_TTL_SECS",
                defaults.cache_refresh_ttl_secs,
            ),
            rate_limit_mode: optional("RATE_LIMIT_MODE", defaults.rate_limit_mode),
            rate_limits: RatePolicies {
                product: optional("RATE_LIMIT_PRODUCT", defaults.rate_limits.product),
                wishlist: optional("RATE_LIMIT_WISHLIST", defaults.rate_limits.wishlist),
                wishlist_page: optional(
                    "RATE_LIMIT_WISHLIST_PAGE",
                    defaults.rate_limits.wishlist_page,
                ),
            },
        })
    }

    /// 为 0 时使用默认值，否则每次存储往返都会立即超时
    pub fn store_timeout(&self) -> Duration {
        match self.store_timeout_ms {
            0 => Duration::from_millis(Self::default().store_timeout_ms),
            ms => Duration::from_millis(ms),
        }
    }

    /// 为 0 的 TTL 使用默认值，存储拒绝写入没有过期时间的缓存
    pub fn cache_policy(&self) -> CachePolicy {
        let defaults = CachePolicy::default();
        let secs_or = |secs: u64, default: Duration| match secs {
            0 => default,
            secs => Duration::from_secs(secs),
        };
        CachePolicy::new(
            secs_or(self.cache_ttl_secs, defaults.ttl),
            secs_or(self.cache_refresh_ttl_secs, defaults.refresh_ttl),
        )
    }
}

/// 读取可选环境变量，缺失或无法解析时使用默认值
fn optional<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            tracing::warn!("Invalid {key} value {raw:?}: {e}, using default");
            default
        }),
        Err(_) => default,
    }
}

/// 与 `optional` 相同，但 0 也视为无效值
fn positive(key: &str, default: u64) -> u64 {
    match optional(key, default) {
        0 => {
            tracing::warn!("Invalid {key} value 0: must be positive, using default");
            default
        }
        value => value,
    }
}
