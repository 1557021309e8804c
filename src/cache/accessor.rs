//! 旁路缓存访问器
//!
//! 读路径软失败：存储错误、超时和解码失败都降级为未命中，调用方总能回退到数据库。
//! 写路径硬失败：`set` / `set_field` 把存储错误返回给调用方。

use std::future::Future;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};

use crate::cache::codec;
use crate::cache::store::KeyedStore;
use crate::error::{ReadThroughError, StoreError};

/// 单个键命名空间的缓存策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// 回填时写入的 TTL
    pub ttl: Duration,
    /// 命中后重置的 TTL（滑动过期）
    pub refresh_ttl: Duration,
}

impl CachePolicy {
    pub const fn new(ttl: Duration, refresh_ttl: Duration) -> Self {
        Self { ttl, refresh_ttl }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(20), Duration::from_secs(20))
    }
}

#[derive(Clone)]
pub struct CacheAccessor {
    store: KeyedStore,
}

impl CacheAccessor {
    pub fn new(store: KeyedStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &KeyedStore {
        &self.store
    }

    /// 读取原始字节，任何存储错误都当作未命中
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self.store.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache GET failed, treating as miss");
                None
            }
        }
    }

    /// 无条件覆盖写入，失败直接返回错误
    pub async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        self.store.set_ex(key, value, ttl).await
    }

    /// 把剩余 TTL 重置为 `ttl`，键不存在或存储出错时返回 false
    pub async fn touch(&self, key: &str, ttl: Duration) -> bool {
        match self.store.expire(key, ttl).await {
            Ok(touched) => touched,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache EXPIRE failed");
                false
            }
        }
    }

    /// 剩余秒数，键不存在、没有过期时间或读取失败时为 -1
    pub async fn remaining_ttl(&self, key: &str) -> i64 {
        match self.store.ttl(key).await {
            Ok(secs) if secs >= 0 => secs,
            Ok(_) => -1,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache TTL failed");
                -1
            }
        }
    }

    pub async fn get_field(&self, key: &str, field: &str) -> Option<Vec<u8>> {
        match self.store.hget(key, field).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, field = %field, error = %e, "Cache HGET failed, treating as miss");
                None
            }
        }
    }

    pub async fn set_field(
        &self,
        key: &str,
        field: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.store.hset_ex(key, field, value, ttl).await
    }

    /// 读穿：命中则解码并刷新 TTL；未命中或解码失败则查询后端并回填。
    ///
    /// `compute` 返回 `Ok(None)` 表示后端没有该记录，此时不写缓存，返回 `ReadThroughError::NotFound`。
    pub async fn fetch_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        policy: CachePolicy,
        compute: F,
    ) -> Result<T, ReadThroughError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        if let Some(value) = self.cached::<T>(key).await {
            tracing::debug!(key = %key, "cache hit");
            if !self.touch(key, policy.refresh_ttl).await {
                tracing::debug!(key = %key, "cache entry vanished before refresh");
            }
            return Ok(value);
        }

        tracing::debug!(key = %key, "cache miss, loading from database");
        let value = compute()
            .await
            .map_err(ReadThroughError::Backing)?
            .ok_or(ReadThroughError::NotFound)?;

        match codec::encode(&value) {
            Ok(bytes) => {
                if let Err(e) = self.set(key, &bytes, policy.ttl).await {
                    tracing::error!(key = %key, error = %e, "Failed to populate cache");
                }
            }
            Err(e) => tracing::error!(key = %key, error = %e, "Failed to encode cache value"),
        }

        Ok(value)
    }

    /// 哈希字段读穿，用于分页数据。命中不刷新 TTL，整个哈希在写入时共享一个 TTL。
    pub async fn fetch_field_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        field: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<T, ReadThroughError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        if let Some(bytes) = self.get_field(key, field).await {
            match codec::decode::<T>(&bytes) {
                Ok(value) => {
                    tracing::debug!(key = %key, field = %field, "cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(key = %key, field = %field, error = %e, "Undecodable cache field, treating as miss");
                }
            }
        }

        let value = compute()
            .await
            .map_err(ReadThroughError::Backing)?
            .ok_or(ReadThroughError::NotFound)?;

        match codec::encode(&value) {
            Ok(bytes) => {
                if let Err(e) = self.set_field(key, field, &bytes, ttl).await {
                    tracing::error!(key = %key, field = %field, error = %e, "Failed to populate cache field");
                }
            }
            Err(e) => tracing::error!(key = %key, error = %e, "Failed to encode cache value"),
        }

        Ok(value)
    }

    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get(key).await?;
        match codec::decode(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Undecodable cache entry, treating as miss");
                None
            }
        }
    }
}
