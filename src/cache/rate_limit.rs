//! 限流器
//!
//! 每个 (调用方, 接口) 一个计数器，值和 TTL 一起写入键值存储。
//! 默认的固定窗口模式是先读后写，两个操作之间不是原子的：同一调用方的并发请求可能同时通过阈值检查，
//! 所以只能保证“每个窗口大约 N 次”。`Atomic` 模式用 `incr_window` 避免这个竞争。

use std::str::FromStr;
use std::time::Duration;

use crate::cache::codec;
use crate::cache::keys::rate_limit_key;
use crate::cache::store::KeyedStore;
use crate::error::StoreError;

/// 计数器当前状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateWindow {
    /// 没有活动窗口（从未调用，或窗口已过期）
    Unset,
    Active { count: u32, remaining_secs: i64 },
    /// 计数可读，但 TTL 读取失败或缺失
    Unknown { count: u32 },
}

impl RateWindow {
    pub fn count(&self) -> u32 {
        match self {
            RateWindow::Unset => 0,
            RateWindow::Active { count, .. } | RateWindow::Unknown { count } => *count,
        }
    }

    /// 旧接口的 (计数, 剩余秒数) 形式，`Unset` 和 `Unknown` 的剩余秒数都是 -1
    pub fn as_pair(&self) -> (u32, i64) {
        match self {
            RateWindow::Unset => (0, -1),
            RateWindow::Active {
                count,
                remaining_secs,
            } => (*count, *remaining_secs),
            RateWindow::Unknown { count } => (*count, -1),
        }
    }
}

/// 单个接口的限流策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub threshold: u32,
    pub window: Duration,
}

impl RatePolicy {
    pub const fn new(threshold: u32, window_secs: u64) -> Self {
        Self {
            threshold,
            window: Duration::from_secs(window_secs),
        }
    }
}

/// 解析 `<阈值>/<窗口秒数>`，例如 `50/300`
impl FromStr for RatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (threshold, window) = s
            .split_once('/')
            .ok_or_else(|| format!("expected <threshold>/<window_secs>, got {s:?}"))?;
        let threshold = threshold
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid threshold in {s:?}: {e}"))?;
        let window = window
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid window in {s:?}: {e}"))?;
        if window == 0 {
            return Err(format!("window must be positive in {s:?}"));
        }
        Ok(Self::new(threshold, window))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitMode {
    /// 先读后写，每次写入都把 TTL 重置为整个窗口
    #[default]
    Fixed,
    /// 原子自增，窗口从第一次调用开始，之后的调用不延长窗口
    Atomic,
}

impl FromStr for RateLimitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "atomic" => Ok(Self::Atomic),
            other => Err(format!("unknown rate limit mode {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { count: u32 },
    /// `retry_after_secs` 为 -1 时表示窗口剩余时间未知
    Rejected { retry_after_secs: i64 },
}

#[derive(Clone)]
pub struct RateLimiter {
    store: KeyedStore,
    mode: RateLimitMode,
}

impl RateLimiter {
    pub fn new(store: KeyedStore, mode: RateLimitMode) -> Self {
        Self { store, mode }
    }

    /// 读取计数和剩余窗口。存储错误或计数无法解码时按 `Unset` 处理
    pub async fn get_rate(&self, caller: &str, action: &str) -> RateWindow {
        let key = rate_limit_key(caller, action);
        let bytes = match self.store.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return RateWindow::Unset,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Rate counter GET failed, treating as unset");
                return RateWindow::Unset;
            }
        };

        let count = match codec::decode::<u32>(&bytes) {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Undecodable rate counter, treating as unset");
                return RateWindow::Unset;
            }
        };

        match self.store.ttl(&key).await {
            Ok(remaining_secs) if remaining_secs >= 0 => RateWindow::Active {
                count,
                remaining_secs,
            },
            // 读取计数和查询 TTL 之间窗口刚好过期
            Ok(-2) => RateWindow::Unset,
            Ok(_) => RateWindow::Unknown { count },
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Rate counter TTL failed");
                RateWindow::Unknown { count }
            }
        }
    }

    /// 覆盖计数并把 TTL 重置为 `window`，不会在旧窗口剩余时间上累加
    pub async fn set_rate(
        &self,
        caller: &str,
        action: &str,
        count: u32,
        window: Duration,
    ) -> Result<(), StoreError> {
        let key = rate_limit_key(caller, action);
        let bytes = codec::encode(&count)?;
        self.store.set_ex(&key, &bytes, window).await
    }

    /// 原子自增，只在新窗口开始时设置 TTL
    pub async fn increment(
        &self,
        caller: &str,
        action: &str,
        window: Duration,
    ) -> Result<RateWindow, StoreError> {
        let key = rate_limit_key(caller, action);
        let (count, ttl) = self.store.incr_window(&key, window).await?;
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        Ok(if ttl >= 0 {
            RateWindow::Active {
                count,
                remaining_secs: ttl,
            }
        } else {
            RateWindow::Unknown { count }
        })
    }

    /// 接口调用前的限流检查。
    ///
    /// 限流器自身出错时放行请求：计数写入失败只记录日志，不影响用户。
    pub async fn check(&self, caller: &str, action: &str, policy: RatePolicy) -> RateDecision {
        match self.mode {
            RateLimitMode::Fixed => {
                let window = self.get_rate(caller, action).await;
                let (count, remaining) = window.as_pair();
                if count >= policy.threshold {
                    return RateDecision::Rejected {
                        retry_after_secs: remaining,
                    };
                }
                if let Err(e) = self
                    .set_rate(caller, action, count + 1, policy.window)
                    .await
                {
                    tracing::error!(caller = %caller, action = %action, error = %e, "Failed to record rate counter");
                }
                RateDecision::Allowed { count: count + 1 }
            }
            RateLimitMode::Atomic => match self.increment(caller, action, policy.window).await {
                Ok(window) if window.count() > policy.threshold => RateDecision::Rejected {
                    retry_after_secs: window.as_pair().1,
                },
                Ok(window) => RateDecision::Allowed {
                    count: window.count(),
                },
                Err(e) => {
                    tracing::error!(caller = %caller, action = %action, error = %e, "Failed to increment rate counter");
                    RateDecision::Allowed { count: 0 }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryStore;

    #[tokio::test]
    async fn unset_counter_reads_as_zero_with_sentinel() {
        let limiter = RateLimiter::new(KeyedStore::memory(), RateLimitMode::Fixed);
        let window = limiter.get_rate("1.2.3.4", "login").await;
        assert_eq!(window, RateWindow::Unset);
        assert_eq!(window.as_pair(), (0, -1));
    }

    #[tokio::test(start_paused = true)]
    async fn set_rate_resets_window_instead_of_extending_it() {
        let limiter = RateLimiter::new(KeyedStore::memory(), RateLimitMode::Fixed);
        let window = Duration::from_secs(60);

        limiter.set_rate("ip", "a", 1, window).await.unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;
        assert_eq!(
            limiter.get_rate("ip", "a").await,
            RateWindow::Active {
                count: 1,
                remaining_secs: 15
            }
        );

        limiter.set_rate("ip", "a", 2, window).await.unwrap();
        assert_eq!(
            limiter.get_rate("ip", "a").await,
            RateWindow::Active {
                count: 2,
                remaining_secs: 60
            }
        );
    }

    #[tokio::test]
    async fn actions_are_counted_separately() {
        let limiter = RateLimiter::new(KeyedStore::memory(), RateLimitMode::Fixed);
        let policy = RatePolicy::new(1, 60);

        assert_eq!(
            limiter.check("ip", "login", policy).await,
            RateDecision::Allowed { count: 1 }
        );
        assert_eq!(
            limiter.check("ip", "signup", policy).await,
            RateDecision::Allowed { count: 1 }
        );
        assert!(matches!(
            limiter.check("ip", "login", policy).await,
            RateDecision::Rejected { .. }
        ));
        assert_eq!(
            limiter.check("other-ip", "login", policy).await,
            RateDecision::Allowed { count: 1 }
        );
    }

    #[tokio::test]
    async fn corrupted_counter_reads_as_unset() {
        let store = KeyedStore::memory();
        store
            .set_ex(&rate_limit_key("ip", "a"), b"{}", Duration::from_secs(60))
            .await
            .unwrap();
        let limiter = RateLimiter::new(store, RateLimitMode::Fixed);
        assert_eq!(limiter.get_rate("ip", "a").await, RateWindow::Unset);
    }

    #[tokio::test]
    async fn counter_without_ttl_reads_as_unknown_and_rejects_with_sentinel() {
        let memory = MemoryStore::default();
        memory.insert_persistent(&rate_limit_key("ip", "a"), b"2");
        let limiter = RateLimiter::new(KeyedStore::Memory(memory), RateLimitMode::Fixed);

        let window = limiter.get_rate("ip", "a").await;
        assert_eq!(window, RateWindow::Unknown { count: 2 });
        assert_eq!(window.as_pair(), (2, -1));

        assert_eq!(
            limiter.check("ip", "a", RatePolicy::new(2, 60)).await,
            RateDecision::Rejected {
                retry_after_secs: -1
            }
        );
        // 未达到阈值时照常放行，并给计数器补上窗口
        assert_eq!(
            limiter.check("ip", "a", RatePolicy::new(5, 60)).await,
            RateDecision::Allowed { count: 3 }
        );
        assert_eq!(
            limiter.get_rate("ip", "a").await,
            RateWindow::Active {
                count: 3,
                remaining_secs: 60
            }
        );
    }

    #[tokio::test]
    async fn unavailable_store_fails_open() {
        let memory = MemoryStore::default();
        let limiter = RateLimiter::new(KeyedStore::Memory(memory.clone()), RateLimitMode::Fixed);
        memory.set_offline(true);

        let policy = RatePolicy::new(1, 60);
        assert_eq!(limiter.get_rate("ip", "a").await, RateWindow::Unset);
        assert!(limiter.set_rate("ip", "a", 1, policy.window).await.is_err());
        for _ in 0..3 {
            assert_eq!(
                limiter.check("ip", "a", policy).await,
                RateDecision::Allowed { count: 1 }
            );
        }

        let atomic = RateLimiter::new(KeyedStore::Memory(memory), RateLimitMode::Atomic);
        assert_eq!(
            atomic.check("ip", "a", policy).await,
            RateDecision::Allowed { count: 0 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn atomic_mode_rejects_after_threshold_without_extending_window() {
        let limiter = RateLimiter::new(KeyedStore::memory(), RateLimitMode::Atomic);
        let policy = RatePolicy::new(2, 60);

        assert_eq!(
            limiter.check("ip", "a", policy).await,
            RateDecision::Allowed { count: 1 }
        );
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(
            limiter.check("ip", "a", policy).await,
            RateDecision::Allowed { count: 2 }
        );
        assert_eq!(
            limiter.check("ip", "a", policy).await,
            RateDecision::Rejected {
                retry_after_secs: 50
            }
        );
        // 原子模式下计数器与固定模式使用同一种编码
        assert_eq!(
            limiter.get_rate("ip", "a").await,
            RateWindow::Active {
                count: 3,
                remaining_secs: 50
            }
        );
    }

    #[test]
    fn policies_parse_from_config_strings() {
        assert_eq!("50/300".parse::<RatePolicy>().unwrap(), RatePolicy::new(50, 300));
        assert!("50".parse::<RatePolicy>().is_err());
        assert!("5/0".parse::<RatePolicy>().is_err());
        assert_eq!("Atomic".parse::<RateLimitMode>().unwrap(), RateLimitMode::Atomic);
    }
}
