//! Fixed-window rate limiter
//!
//! Counts requests per caller identity in fixed windows. The first request
//! for a key opens a window with count 1; requests inside the window
//! increment; once the count exceeds the configured maximum every further
//! request is rejected until the window rolls over on the next request made
//! after it has elapsed. Expiry is lazy — no background timer.
//!
//! The counter store is pluggable: a guarded in-process map is enough for a
//! single instance, while horizontally scaled deployments must share
//! counters through Redis or the limit is only enforced per instance.

use async_trait::async_trait;
use haven_cache::keys::rate_limit_key;
use haven_core::{
    traits::{CounterStore, WindowSnapshot},
    AppError, AppResult,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    /// Whether the request must be rejected
    pub limited: bool,

    /// Requests left in the current window
    pub remaining: u32,

    /// Time until the window rolls over
    pub reset_after: Duration,
}

/// Fixed-window rate limiter over a counter store
pub struct RateLimiter {
    scope: String,
    window: Duration,
    max_requests: u32,
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    /// Create a limiter for a scope (e.g. "auth", "payments")
    pub fn new(
        scope: impl Into<String>,
        window: Duration,
        max_requests: u32,
        store: Arc<dyn CounterStore>,
    ) -> Self {
        Self {
            scope: scope.into(),
            window,
            max_requests,
            store,
        }
    }

    /// Count a request and decide whether it is allowed
    #[instrument(skip(self))]
    pub async fn check(&self, identity: &str) -> AppResult<RateDecision> {
        let key = rate_limit_key(&self.scope, identity);
        let WindowSnapshot { count, reset_after } = self.store.hit(&key, self.window).await?;

        if count > self.max_requests {
            warn!(
                "Rate limit exceeded for {} in scope {} ({} > {})",
                identity, self.scope, count, self.max_requests
            );
            return Ok(RateDecision {
                limited: true,
                remaining: 0,
                reset_after,
            });
        }

        debug!(
            "Request {}/{} for {} in scope {}",
            count, self.max_requests, identity, self.scope
        );

        Ok(RateDecision {
            limited: false,
            remaining: self.max_requests - count,
            reset_after,
        })
    }

    /// Like [`check`](Self::check) but turns a limited decision into the
    /// `RateLimited` error carrying retry metadata for the 429 response
    pub async fn enforce(&self, identity: &str) -> AppResult<RateDecision> {
        let decision = self.check(identity).await?;
        if decision.limited {
            return Err(AppError::RateLimited {
                remaining: decision.remaining,
                reset_after_secs: decision.reset_after.as_secs(),
            });
        }
        Ok(decision)
    }
}

/// A single open window
struct RateWindow {
    window_start: Instant,
    window: Duration,
    count: u32,
}

/// In-process counter store
///
/// Process-local state: correct for a single instance, under-enforcing when
/// the service is horizontally scaled (each instance keeps its own
/// counters). Scaled deployments use the Redis-backed store instead.
#[derive(Default)]
pub struct MemoryCounterStore {
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl MemoryCounterStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop windows that have elapsed, so abandoned keys do not accumulate
    fn cleanup(windows: &mut HashMap<String, RateWindow>, now: Instant) {
        windows.retain(|_, w| now.duration_since(w.window_start) <= w.window);
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn hit(&self, key: &str, window: Duration) -> AppResult<WindowSnapshot> {
        let mut windows = self.windows.lock();
        let now = Instant::now();

        Self::cleanup(&mut windows, now);

        let entry = windows.entry(key.to_string()).or_insert(RateWindow {
            window_start: now,
            window,
            count: 0,
        });

        // Reset, not decrement, once the window has elapsed
        if now.duration_since(entry.window_start) > entry.window {
            entry.window_start = now;
            entry.count = 0;
        }

        entry.count += 1;

        let elapsed = now.duration_since(entry.window_start);
        let reset_after = entry.window.saturating_sub(elapsed);

        Ok(WindowSnapshot {
            count: entry.count,
            reset_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(window: Duration, max: u32) -> RateLimiter {
        RateLimiter::new(
            "test",
            window,
            max,
            Arc::new(MemoryCounterStore::new()),
        )
    }

    #[tokio::test]
    async fn test_requests_within_limit_pass() {
        let l = limiter(Duration::from_secs(60), 3);

        for expected_remaining in [2, 1, 0] {
            let d = l.check("caller-1").await.unwrap();
            assert!(!d.limited);
            assert_eq!(d.remaining, expected_remaining);
        }
    }

    #[tokio::test]
    async fn test_request_over_limit_rejected() {
        let l = limiter(Duration::from_secs(60), 3);

        for _ in 0..3 {
            assert!(!l.check("caller-1").await.unwrap().limited);
        }

        // The (max+1)-th request inside the window is rejected, and so is
        // every one after it
        let d = l.check("caller-1").await.unwrap();
        assert!(d.limited);
        assert_eq!(d.remaining, 0);

        let d = l.check("caller-1").await.unwrap();
        assert!(d.limited);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_interfere() {
        let l = limiter(Duration::from_secs(60), 1);

        assert!(!l.check("caller-1").await.unwrap().limited);
        assert!(l.check("caller-1").await.unwrap().limited);

        // A different caller still has a fresh window
        assert!(!l.check("caller-2").await.unwrap().limited);
    }

    #[tokio::test]
    async fn test_window_rollover() {
        let l = limiter(Duration::from_millis(50), 1);

        assert!(!l.check("caller-1").await.unwrap().limited);
        assert!(l.check("caller-1").await.unwrap().limited);

        tokio::time::sleep(Duration::from_millis(80)).await;

        // First request after the window elapsed starts a fresh window
        let d = l.check("caller-1").await.unwrap();
        assert!(!d.limited);
        assert_eq!(d.remaining, 0);
    }

    #[tokio::test]
    async fn test_enforce_maps_to_error() {
        let l = limiter(Duration::from_secs(60), 1);

        assert!(l.enforce("caller-1").await.is_ok());

        let err = l.enforce("caller-1").await.unwrap_err();
        match err {
            AppError::RateLimited {
                remaining,
                reset_after_secs,
            } => {
                assert_eq!(remaining, 0);
                assert!(reset_after_secs <= 60);
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reset_metadata_counts_down() {
        let l = limiter(Duration::from_secs(60), 5);

        let d = l.check("caller-1").await.unwrap();
        assert!(d.reset_after <= Duration::from_secs(60));
        assert!(d.reset_after > Duration::from_secs(50));
    }

    #[tokio::test]
    async fn test_cleanup_drops_dead_windows() {
        let store = MemoryCounterStore::new();
        let short = Duration::from_millis(10);

        store.hit("ratelimit:test:a", short).await.unwrap();
        store.hit("ratelimit:test:b", short).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        // Any hit triggers the cleanup pass for all elapsed windows
        store
            .hit("ratelimit:test:c", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.windows.lock().len(), 1);
    }
}
