//! Cache layer
//!
//! Availability probes and per-room reservation lists are cached behind a
//! small abstraction:
//! - In-memory cache (moka) - default, for single-instance deployment
//! - Redis cache - optional `redis-cache` feature, for running more than
//!   one instance (in-process maps do not survive horizontal scaling)
//!
//! Keys are namespaced per room (`room:{id}:...`), so writes invalidate by
//! prefix rather than by enumerating every key they may have touched.

pub mod memory;
#[cfg(feature = "redis-cache")]
pub mod redis;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheConfig, CacheDriver};

pub use memory::MemoryCache;
#[cfg(feature = "redis-cache")]
pub use redis::RedisCache;

/// Cache layer trait
///
/// The generic methods make this trait non-object-safe; use the `Cache`
/// enum for runtime polymorphism.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()>;

    /// Delete a single key
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every key starting with `prefix`
    async fn invalidate_prefix(&self, prefix: &str) -> Result<()>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<()>;
}

/// Unified cache enum for runtime polymorphism
#[derive(Debug)]
pub enum Cache {
    /// In-memory cache using moka
    Memory(MemoryCache),
    /// Redis cache for distributed deployment
    #[cfg(feature = "redis-cache")]
    Redis(RedisCache),
}

#[async_trait]
impl CacheLayer for Cache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self {
            Cache::Memory(cache) => cache.get(key).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.get(key).await,
        }
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.set(key, value, ttl).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.delete(key).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.delete(key).await,
        }
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.invalidate_prefix(prefix).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.invalidate_prefix(prefix).await,
        }
    }

    async fn clear(&self) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.clear().await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.clear().await,
        }
    }
}

/// Create a cache instance based on configuration.
///
/// Selecting the Redis driver without the `redis-cache` feature is a
/// configuration error rather than a silent fallback to process memory.
pub async fn create_cache(config: &CacheConfig) -> Result<Arc<Cache>> {
    let ttl = Duration::from_secs(config.ttl_seconds);

    match config.driver {
        CacheDriver::Memory => {
            let cache = MemoryCache::with_capacity_and_ttl(10_000, ttl);
            Ok(Arc::new(Cache::Memory(cache)))
        }
        CacheDriver::Redis => {
            #[cfg(feature = "redis-cache")]
            {
                let redis_url = config.redis_url.as_ref().ok_or_else(|| {
                    anyhow::anyhow!(
                        "Redis URL is required when using the Redis cache driver; \
                         set 'redis_url' in the cache configuration."
                    )
                })?;

                let cache = RedisCache::with_ttl(redis_url, ttl).await?;
                Ok(Arc::new(Cache::Redis(cache)))
            }

            #[cfg(not(feature = "redis-cache"))]
            {
                anyhow::bail!(
                    "Redis cache driver is configured but the 'redis-cache' feature is not \
                     enabled. Rebuild with `--features redis-cache` or use the 'memory' driver."
                )
            }
        }
    }
}
