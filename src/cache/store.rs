//! 键值存储客户端
//!
//! 缓存访问器和限流器共享同一个 `KeyedStore`，进程启动时创建一次，之后在所有请求间克隆复用。
//!
//! - `Redis`: 生产环境，基于 `ConnectionManager`，每次往返都有超时上限
//! - `Memory`: 进程内实现，语义与 Redis 保持一致（TTL、-2/-1 约定），用于测试和无 Redis 的本地运行

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::time::Instant;

use crate::error::StoreError;

/// 原子计数脚本：只有首次创建计数器时才设置过期时间，后续自增不会延长窗口
static INCR_WINDOW_SCRIPT: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return {count, redis.call('TTL', KEYS[1])}
",
    )
});

/// 进程内存储两次全表清理过期键之间的最短间隔
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub enum KeyedStore {
    Redis(RedisStore),
    Memory(MemoryStore),
}

impl KeyedStore {
    /// 根据 URL 创建存储客户端，`memory://` 使用进程内存储
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        if url.starts_with("memory://") {
            tracing::warn!("Using in-process keyed store, state is not shared across instances");
            return Ok(Self::memory());
        }

        let client = redis::Client::open(url)?;
        let conn = match tokio::time::timeout(timeout * 20, client.get_connection_manager()).await
        {
            Ok(conn) => conn?,
            Err(_) => return Err(StoreError::Timeout(timeout * 20)),
        };
        Ok(Self::Redis(RedisStore { conn, timeout }))
    }

    pub fn memory() -> Self {
        Self::Memory(MemoryStore::default())
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Redis(_) => "redis",
            Self::Memory(_) => "memory",
        }
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        match self {
            Self::Redis(store) => {
                let mut conn = store.conn.clone();
                let _: String = store
                    .bounded(redis::cmd("PING").query_async(&mut conn))
                    .await?;
                Ok(())
            }
            Self::Memory(store) => store.ensure_online(),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self {
            Self::Redis(store) => {
                let mut conn = store.conn.clone();
                store.bounded(conn.get(key)).await
            }
            Self::Memory(store) => store.get(key),
        }
    }

    /// 无条件写入并把 TTL 设为 `ttl`
    pub async fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        let secs = whole_secs(ttl)?;
        match self {
            Self::Redis(store) => {
                let mut conn = store.conn.clone();
                store.bounded(conn.set_ex(key, value, secs)).await
            }
            Self::Memory(store) => store.set_ex(key, value, Duration::from_secs(secs)),
        }
    }

    /// 把剩余 TTL 重置为 `ttl`（不是累加），键不存在时返回 false
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let secs = whole_secs(ttl)?;
        match self {
            Self::Redis(store) => {
                let mut conn = store.conn.clone();
                store.bounded(conn.expire(key, secs as i64)).await
            }
            Self::Memory(store) => store.expire(key, Duration::from_secs(secs)),
        }
    }

    /// 剩余秒数；-2 表示键不存在，-1 表示没有过期时间
    pub async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        match self {
            Self::Redis(store) => {
                let mut conn = store.conn.clone();
                store.bounded(conn.ttl(key)).await
            }
            Self::Memory(store) => store.ttl(key),
        }
    }

    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self {
            Self::Redis(store) => {
                let mut conn = store.conn.clone();
                store.bounded(conn.hget(key, field)).await
            }
            Self::Memory(store) => store.hget(key, field),
        }
    }

    /// 写入哈希字段后把整个哈希的 TTL 设为 `ttl`
    pub async fn hset_ex(
        &self,
        key: &str,
        field: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let secs = whole_secs(ttl)?;
        match self {
            Self::Redis(store) => {
                let mut conn = store.conn.clone();
                let mut pipe = redis::pipe();
                pipe.atomic()
                    .hset(key, field, value)
                    .ignore()
                    .expire(key, secs as i64)
                    .ignore();
                store.bounded(pipe.query_async(&mut conn)).await
            }
            Self::Memory(store) => store.hset_ex(key, field, value, Duration::from_secs(secs)),
        }
    }

    /// 原子自增计数器，返回 (自增后的值, 剩余 TTL)
    pub async fn incr_window(&self, key: &str, window: Duration) -> Result<(i64, i64), StoreError> {
        let secs = whole_secs(window)?;
        match self {
            Self::Redis(store) => {
                let mut conn = store.conn.clone();
                let mut invocation = INCR_WINDOW_SCRIPT.prepare_invoke();
                invocation.key(key).arg(secs);
                store.bounded(invocation.invoke_async(&mut conn)).await
            }
            Self::Memory(store) => store.incr_window(key, Duration::from_secs(secs)),
        }
    }
}

fn whole_secs(ttl: Duration) -> Result<u64, StoreError> {
    match ttl.as_secs() {
        0 => Err(StoreError::InvalidTtl(ttl)),
        secs => Ok(secs),
    }
}

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    timeout: Duration,
}

impl RedisStore {
    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

#[derive(Debug, Clone)]
enum MemoryValue {
    Bytes(Vec<u8>),
    Hash(std::collections::HashMap<String, Vec<u8>>),
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: MemoryValue,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// 进程内存储，过期判断基于 `tokio::time::Instant`，测试中可以暂停和推进时钟
///
/// 读取时惰性删除过期键；写入时最多每 `PURGE_INTERVAL` 清理一次全表，
/// 只写不读的键（例如按客户端 IP 生成的限流键）也会被回收。
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, MemoryEntry>>,
    offline: Arc<AtomicBool>,
    next_purge: Arc<Mutex<Option<Instant>>>,
}

impl MemoryStore {
    /// 模拟存储不可用，之后的每个操作都返回 `StoreError::Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }

    fn purge_expired(&self) {
        let now = Instant::now();
        {
            let mut next = self.next_purge.lock().unwrap_or_else(|e| e.into_inner());
            if next.is_some_and(|at| now < at) {
                return;
            }
            *next = Some(now + PURGE_INTERVAL);
        }
        self.entries.retain(|_, e| !e.is_expired(now));
    }

    /// 惰性淘汰：读取时发现过期就删除
    fn live(&self, key: &str) -> Option<MemoryEntry> {
        let now = Instant::now();
        let entry = self.entries.get(key)?.clone();
        if entry.is_expired(now) {
            self.entries.remove_if(key, |_, e| e.is_expired(now));
            return None;
        }
        Some(entry)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.ensure_online()?;
        match self.live(key) {
            Some(MemoryEntry {
                value: MemoryValue::Bytes(bytes),
                ..
            }) => Ok(Some(bytes)),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(None),
        }
    }

    fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        self.ensure_online()?;
        self.purge_expired();
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: MemoryValue::Bytes(value.to_vec()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.ensure_online()?;
        let now = Instant::now();
        Ok(match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.expires_at = Some(now + ttl);
                true
            }
            _ => false,
        })
    }

    fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        self.ensure_online()?;
        let Some(entry) = self.live(key) else {
            return Ok(-2);
        };
        Ok(match entry.expires_at {
            // 与 Redis 一致：按毫秒四舍五入到秒
            Some(at) => {
                let millis = at.saturating_duration_since(Instant::now()).as_millis() as i64;
                (millis + 500) / 1000
            }
            None => -1,
        })
    }

    fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.ensure_online()?;
        match self.live(key) {
            Some(MemoryEntry {
                value: MemoryValue::Hash(fields),
                ..
            }) => Ok(fields.get(field).cloned()),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(None),
        }
    }

    fn hset_ex(
        &self,
        key: &str,
        field: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.ensure_online()?;
        self.purge_expired();
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| MemoryEntry {
                value: MemoryValue::Hash(Default::default()),
                expires_at: None,
            });
        if entry.is_expired(now) {
            entry.value = MemoryValue::Hash(Default::default());
        }
        match &mut entry.value {
            MemoryValue::Hash(fields) => {
                fields.insert(field.to_string(), value.to_vec());
            }
            MemoryValue::Bytes(_) => return Err(StoreError::WrongType),
        }
        entry.expires_at = Some(now + ttl);
        Ok(())
    }

    fn incr_window(&self, key: &str, window: Duration) -> Result<(i64, i64), StoreError> {
        self.ensure_online()?;
        self.purge_expired();
        let now = Instant::now();
        let count = {
            let mut entry = self
                .entries
                .entry(key.to_string())
                .or_insert_with(|| MemoryEntry {
                    value: MemoryValue::Bytes(b"0".to_vec()),
                    expires_at: None,
                });
            if entry.is_expired(now) {
                *entry = MemoryEntry {
                    value: MemoryValue::Bytes(b"0".to_vec()),
                    expires_at: None,
                };
            }
            let current = match &entry.value {
                MemoryValue::Bytes(bytes) => std::str::from_utf8(bytes)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or(StoreError::NotAnInteger)?,
                MemoryValue::Hash(_) => return Err(StoreError::WrongType),
            };
            let count = current + 1;
            entry.value = MemoryValue::Bytes(count.to_string().into_bytes());
            if count == 1 {
                entry.expires_at = Some(now + window);
            }
            count
        };
        Ok((count, self.ttl(key)?))
    }

    /// 写入一个没有过期时间的值
    #[cfg(test)]
    pub(crate) fn insert_persistent(&self, key: &str, value: &[u8]) {
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: MemoryValue::Bytes(value.to_vec()),
                expires_at: None,
            },
        );
    }
}
