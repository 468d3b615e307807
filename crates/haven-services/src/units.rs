//! Cache-aside unit directory
//!
//! Wraps the listing directory with a read-through cache: quote,
//! availability, and create all load the same unit row, and listings change
//! rarely compared to how often they are priced. Cache failures degrade to
//! database reads, never to request failures.

use async_trait::async_trait;
use haven_cache::keys::{unit_key, UNIT_TTL_SECS};
use haven_core::{
    models::Unit,
    traits::{CacheService, UnitDirectory},
    AppResult,
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Unit directory with an optional cache in front
///
/// `None` for the cache means plain passthrough — the engine stays up when
/// Redis is not.
pub struct CachedUnitDirectory<D: UnitDirectory, C: CacheService> {
    inner: Arc<D>,
    cache: Option<C>,
}

impl<D: UnitDirectory, C: CacheService> CachedUnitDirectory<D, C> {
    /// Wrap a directory with a cache
    pub fn new(inner: Arc<D>, cache: Option<C>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<D: UnitDirectory, C: CacheService> UnitDirectory for CachedUnitDirectory<D, C> {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Unit>> {
        let key = unit_key(&id.to_string());

        if let Some(cache) = &self.cache {
            match cache.get::<Unit>(&key).await {
                Ok(Some(unit)) => {
                    debug!("Unit cache HIT for {}", id);
                    return Ok(Some(unit));
                }
                Ok(None) => {}
                Err(e) => {
                    // Cache trouble must not fail the request
                    warn!("Unit cache read failed for {}: {}", id, e);
                }
            }
        }

        let unit = self.inner.find_by_id(id).await?;

        if let (Some(cache), Some(unit)) = (&self.cache, &unit) {
            if let Err(e) = cache.set(&key, unit, UNIT_TTL_SECS).await {
                warn!("Failed to cache unit {}: {}", id, e);
            }
        }

        Ok(unit)
    }

    async fn list_active(&self, limit: i64, offset: i64) -> AppResult<Vec<Unit>> {
        // Listing pages are not on the reservation hot path
        self.inner.list_active(limit, offset).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::tests::{sample_unit, MockUnitDirectory};
    use haven_core::AppError;
    use parking_lot::Mutex;
    use serde::{de::DeserializeOwned, Serialize};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MapCache {
        store: Mutex<HashMap<String, String>>,
    }

    impl MapCache {
        fn new() -> Self {
            Self {
                store: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl CacheService for MapCache {
        async fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
            self.store
                .lock()
                .get(key)
                .map(|json| serde_json::from_str(json))
                .transpose()
                .map_err(|e| AppError::Serialization(e.to_string()))
        }

        async fn set<T: Serialize + Send + Sync>(
            &self,
            key: &str,
            value: &T,
            _ttl_secs: u64,
        ) -> AppResult<()> {
            let json = serde_json::to_string(value)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            self.store.lock().insert(key.to_string(), json);
            Ok(())
        }

        async fn delete(&self, key: &str) -> AppResult<bool> {
            Ok(self.store.lock().remove(key).is_some())
        }

        async fn exists(&self, key: &str) -> AppResult<bool> {
            Ok(self.store.lock().contains_key(key))
        }
    }

    struct CountingDirectory {
        inner: MockUnitDirectory,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl UnitDirectory for CountingDirectory {
        async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Unit>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.find_by_id(id).await
        }

        async fn list_active(&self, limit: i64, offset: i64) -> AppResult<Vec<Unit>> {
            self.inner.list_active(limit, offset).await
        }
    }

    #[tokio::test]
    async fn test_second_read_hits_cache() {
        let unit = sample_unit();
        let counting = Arc::new(CountingDirectory {
            inner: MockUnitDirectory {
                units: vec![unit.clone()],
            },
            calls: AtomicUsize::new(0),
        });
        let cached = CachedUnitDirectory::new(counting.clone(), Some(MapCache::new()));

        let first = cached.find_by_id(unit.id).await.unwrap().unwrap();
        let second = cached.find_by_id(unit.id).await.unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_miss_is_not_cached() {
        let counting = Arc::new(CountingDirectory {
            inner: MockUnitDirectory { units: vec![] },
            calls: AtomicUsize::new(0),
        });
        let cached = CachedUnitDirectory::new(counting.clone(), Some(MapCache::new()));

        let missing = Uuid::new_v4();
        assert!(cached.find_by_id(missing).await.unwrap().is_none());
        assert!(cached.find_by_id(missing).await.unwrap().is_none());

        // Both lookups reached the directory
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_passthrough_without_cache() {
        let unit = sample_unit();
        let counting = Arc::new(CountingDirectory {
            inner: MockUnitDirectory {
                units: vec![unit.clone()],
            },
            calls: AtomicUsize::new(0),
        });
        let cached: CachedUnitDirectory<_, MapCache> =
            CachedUnitDirectory::new(counting.clone(), None);

        cached.find_by_id(unit.id).await.unwrap();
        cached.find_by_id(unit.id).await.unwrap();

        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    }
}
