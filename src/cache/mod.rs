// 缓存模块
// 包含键值存储客户端、读穿缓存访问器和限流器

pub mod accessor;
pub mod codec;
pub mod keys;
pub mod rate_limit;
pub mod store;

// 重新导出常用类型，方便其他模块使用
pub use accessor::{CacheAccessor, CachePolicy};
pub use rate_limit::{RateDecision, RateLimitMode, RateLimiter, RatePolicy, RateWindow};
pub use store::{KeyedStore, MemoryStore};
