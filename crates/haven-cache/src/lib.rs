//! Redis caching layer for Haven
//!
//! Provides a caching implementation using Redis with connection pooling,
//! plus the shared fixed-window counter store that backs the rate limiter
//! when the service is horizontally scaled.
//!
//! # Features
//!
//! - Connection pooling via Redis ConnectionManager
//! - Automatic serialization/deserialization using serde_json
//! - TTL support for cache entries
//! - Atomic `INCR`-based counters with window expiry for rate limiting
//! - Comprehensive error handling with conversion to AppError
//!
//! # Example
//!
//! ```no_run
//! use haven_cache::RedisCache;
//! use haven_core::traits::CacheService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = RedisCache::new("redis://127.0.0.1:6379").await?;
//!
//!     // Set a value with 60 second TTL
//!     cache.set("my_key", &"my_value", 60).await?;
//!
//!     // Get the value back
//!     let value: Option<String> = cache.get("my_key").await?;
//!     assert_eq!(value, Some("my_value".to_string()));
//!
//!     Ok(())
//! }
//! ```

pub mod keys;

use async_trait::async_trait;
use haven_core::error::AppError;
use haven_core::traits::{CacheService, CounterStore, WindowSnapshot};
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Redis cache implementation with connection pooling
///
/// Wraps a Redis ConnectionManager to provide efficient, multiplexed access
/// to Redis. All operations are async and return Results with AppError.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Create a new Redis cache instance
    ///
    /// # Arguments
    ///
    /// * `url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    ///
    /// # Errors
    ///
    /// Returns `AppError::CacheConnection` if the connection fails
    pub async fn new(url: &str) -> Result<Self, AppError> {
        debug!("Connecting to Redis at {}", url);

        let client = Client::open(url).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            AppError::CacheConnection(format!("Invalid Redis URL: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to establish Redis connection: {}", e);
            AppError::CacheConnection(format!("Connection failed: {}", e))
        })?;

        debug!("Redis connection established successfully");
        Ok(Self { manager })
    }

    /// Ping the Redis server to check connectivity
    pub async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis ping failed: {}", e);
                AppError::Cache(format!("Ping failed: {}", e))
            })?;
        Ok(())
    }

    /// Flush all keys from the current database
    ///
    /// # Warning
    ///
    /// Destructive; testing only.
    #[cfg(test)]
    pub async fn flush_db(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Failed to flush database: {}", e);
                AppError::Cache(format!("Flush failed: {}", e))
            })?;
        Ok(())
    }

    /// Convert RedisError to AppError
    fn map_redis_error(err: RedisError) -> AppError {
        match err.kind() {
            redis::ErrorKind::IoError => {
                error!("Redis I/O error: {}", err);
                AppError::CacheConnection(format!("I/O error: {}", err))
            }
            redis::ErrorKind::TypeError => {
                warn!("Redis type error: {}", err);
                AppError::Cache(format!("Type mismatch: {}", err))
            }
            _ => {
                error!("Redis error: {}", err);
                AppError::Cache(err.to_string())
            }
        }
    }
}

#[async_trait]
impl CacheService for RedisCache {
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        debug!("GET {}", key);
        let mut conn = self.manager.clone();

        let result: Option<String> = conn.get(key).await.map_err(Self::map_redis_error)?;

        match result {
            Some(json) => {
                let value = serde_json::from_str::<T>(&json).map_err(|e| {
                    error!("Failed to deserialize value for key {}: {}", key, e);
                    AppError::Serialization(format!("Deserialization failed: {}", e))
                })?;
                debug!("Cache HIT: {}", key);
                Ok(Some(value))
            }
            None => {
                debug!("Cache MISS: {}", key);
                Ok(None)
            }
        }
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), AppError> {
        debug!("SET {} (TTL: {}s)", key, ttl_secs);
        let mut conn = self.manager.clone();

        let json = serde_json::to_string(value).map_err(|e| {
            error!("Failed to serialize value for key {}: {}", key, e);
            AppError::Serialization(format!("Serialization failed: {}", e))
        })?;

        let _: () = conn
            .set_ex(key, json, ttl_secs)
            .await
            .map_err(Self::map_redis_error)?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        debug!("DEL {}", key);
        let mut conn = self.manager.clone();

        let deleted: i32 = conn.del(key).await.map_err(Self::map_redis_error)?;

        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        debug!("EXISTS {}", key);
        let mut conn = self.manager.clone();

        let exists: bool = conn.exists(key).await.map_err(Self::map_redis_error)?;

        Ok(exists)
    }
}

/// Shared fixed-window counter store backed by Redis
///
/// `INCR` is atomic across all application instances, so the configured
/// limit is enforced globally rather than per process. The window key
/// expires on its own; a fresh window starts with the first `INCR` after
/// expiry.
#[derive(Clone)]
pub struct RedisCounterStore {
    manager: ConnectionManager,
}

impl RedisCounterStore {
    /// Create a counter store sharing an existing cache connection
    pub fn new(cache: &RedisCache) -> Self {
        Self {
            manager: cache.manager.clone(),
        }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<WindowSnapshot, AppError> {
        let mut conn = self.manager.clone();
        let window_secs = window.as_secs().max(1) as i64;

        let count: u32 = conn
            .incr(key, 1)
            .await
            .map_err(RedisCache::map_redis_error)?;

        // First hit opens the window; set its expiry. EXPIRE NX keeps a
        // concurrent first hit from extending an already-opened window.
        if count == 1 {
            let _: bool = redis::cmd("EXPIRE")
                .arg(key)
                .arg(window_secs)
                .arg("NX")
                .query_async(&mut conn)
                .await
                .map_err(RedisCache::map_redis_error)?;
        }

        let ttl: i64 = conn.ttl(key).await.map_err(RedisCache::map_redis_error)?;

        // A key without expiry (EXPIRE lost to a crash between INCR and
        // EXPIRE) would throttle forever; re-arm it.
        if ttl < 0 {
            let _: bool = conn
                .expire(key, window_secs)
                .await
                .map_err(RedisCache::map_redis_error)?;
        }

        let reset_after = if ttl > 0 {
            Duration::from_secs(ttl as u64)
        } else {
            window
        };

        Ok(WindowSnapshot { count, reset_after })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestData {
        id: i32,
        name: String,
    }

    async fn setup_cache() -> RedisCache {
        let cache = RedisCache::new("redis://127.0.0.1:6379")
            .await
            .expect("Failed to connect to Redis");
        cache.flush_db().await.expect("Failed to flush DB");
        cache
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_ping() {
        let cache = setup_cache().await;
        assert!(cache.ping().await.is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_set_and_get() {
        let cache = setup_cache().await;

        let data = TestData {
            id: 1,
            name: "Test".to_string(),
        };

        cache.set("test_key", &data, 60).await.unwrap();

        let result: Option<TestData> = cache.get("test_key").await.unwrap();
        assert_eq!(result, Some(data));
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_get_nonexistent() {
        let cache = setup_cache().await;

        let result: Option<TestData> = cache.get("nonexistent").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_delete() {
        let cache = setup_cache().await;

        let data = TestData {
            id: 1,
            name: "Test".to_string(),
        };

        cache.set("test_key", &data, 60).await.unwrap();
        assert!(cache.exists("test_key").await.unwrap());

        let deleted = cache.delete("test_key").await.unwrap();
        assert!(deleted);
        assert!(!cache.exists("test_key").await.unwrap());

        let deleted = cache.delete("test_key").await.unwrap();
        assert!(!deleted);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_counter_window() {
        let cache = setup_cache().await;
        let store = RedisCounterStore::new(&cache);
        let window = Duration::from_secs(60);

        let first = store.hit("ratelimit:test:k1", window).await.unwrap();
        assert_eq!(first.count, 1);
        assert!(first.reset_after <= window);

        let second = store.hit("ratelimit:test:k1", window).await.unwrap();
        assert_eq!(second.count, 2);

        // Distinct keys get distinct windows
        let other = store.hit("ratelimit:test:k2", window).await.unwrap();
        assert_eq!(other.count, 1);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_counter_window_rollover() {
        let cache = setup_cache().await;
        let store = RedisCounterStore::new(&cache);
        let window = Duration::from_secs(1);

        let first = store.hit("ratelimit:test:k3", window).await.unwrap();
        assert_eq!(first.count, 1);

        tokio::time::sleep(Duration::from_secs(2)).await;

        // Window elapsed; a fresh one opens
        let after = store.hit("ratelimit:test:k3", window).await.unwrap();
        assert_eq!(after.count, 1);
    }
}
