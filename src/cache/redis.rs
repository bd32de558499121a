//! Redis cache implementation
//!
//! Distributed cache for multi-instance deployments. Prefix invalidation
//! uses SCAN + DEL rather than KEYS, which would block the server.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// Default TTL for cache entries
const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Keys scanned per SCAN iteration
const SCAN_COUNT: usize = 100;

/// Redis cache implementation
pub struct RedisCache {
    connection: MultiplexedConnection,
    default_ttl: Duration,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Connect with the default TTL
    pub async fn new(redis_url: &str) -> Result<Self> {
        Self::with_ttl(redis_url, DEFAULT_TTL).await
    }

    /// Connect with a custom default TTL
    pub async fn with_ttl(redis_url: &str, default_ttl: Duration) -> Result<Self> {
        let client = Client::open(redis_url).context("Failed to create Redis client")?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self {
            connection,
            default_ttl,
        })
    }

    /// The TTL applied when callers pass none of their own
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

#[async_trait]
impl CacheLayer for RedisCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.connection.clone();

        let result: Option<String> = conn
            .get(key)
            .await
            .context("Failed to get value from Redis")?;

        match result {
            Some(json) => {
                let value =
                    serde_json::from_str(&json).context("Failed to deserialize cached value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.connection.clone();

        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;

        let ttl_secs = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(key, json, ttl_secs)
            .await
            .context("Failed to set value in Redis")?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.clone();

        let _: () = conn
            .del(key)
            .await
            .context("Failed to delete key from Redis")?;

        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .context("Failed to scan Redis keys")?;

            if !keys.is_empty() {
                let _: () = conn
                    .del(&keys)
                    .await
                    .context("Failed to delete scanned keys")?;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.connection.clone();

        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .context("Failed to clear Redis database")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
    }

    #[tokio::test]
    #[ignore = "requires running Redis server"]
    async fn test_set_get_delete() {
        let cache = RedisCache::new(&redis_url()).await.unwrap();

        cache
            .set("innkeeper:test:key", &"value".to_string(), Duration::from_secs(30))
            .await
            .unwrap();
        let value: Option<String> = cache.get("innkeeper:test:key").await.unwrap();
        assert_eq!(value, Some("value".to_string()));

        cache.delete("innkeeper:test:key").await.unwrap();
        let value: Option<String> = cache.get("innkeeper:test:key").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    #[ignore = "requires running Redis server"]
    async fn test_invalidate_prefix() {
        let cache = RedisCache::new(&redis_url()).await.unwrap();

        cache.set("innkeeper:room:1:a", &1i32, Duration::from_secs(30)).await.unwrap();
        cache.set("innkeeper:room:1:b", &2i32, Duration::from_secs(30)).await.unwrap();
        cache.set("innkeeper:room:2:a", &3i32, Duration::from_secs(30)).await.unwrap();

        cache.invalidate_prefix("innkeeper:room:1:").await.unwrap();

        let a: Option<i32> = cache.get("innkeeper:room:1:a").await.unwrap();
        let other: Option<i32> = cache.get("innkeeper:room:2:a").await.unwrap();
        assert!(a.is_none());
        assert_eq!(other, Some(3));

        cache.delete("innkeeper:room:2:a").await.unwrap();
    }
}
