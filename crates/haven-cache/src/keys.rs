//! Cache key constants and builders for Haven
//!
//! Provides standardized key naming patterns for all cached entities,
//! ensuring consistency across the application and preventing key
//! collisions.
//!
//! # Key Patterns
//!
//! - `unit:{unit_id}` - Cached unit listing data
//! - `ratelimit:{scope}:{identity}` - Fixed-window request counters

/// Prefix for cached units
///
/// Format: `unit:{unit_id}`
pub const UNIT_PREFIX: &str = "unit";

/// Prefix for rate-limit counters
///
/// Format: `ratelimit:{scope}:{identity}`
pub const RATE_LIMIT_PREFIX: &str = "ratelimit";

/// Default TTL for cached units (5 minutes)
///
/// Reservation rows are never cached: the lifecycle moves fast around
/// payment time and a stale status is worse than a database read.
pub const UNIT_TTL_SECS: u64 = 300;

/// Build a cache key for a unit
///
/// # Example
///
/// ```
/// use haven_cache::keys::unit_key;
///
/// let key = unit_key("0c8e7a1f");
/// assert_eq!(key, "unit:0c8e7a1f");
/// ```
pub fn unit_key(unit_id: &str) -> String {
    format!("{}:{}", UNIT_PREFIX, unit_id)
}

/// Build a counter key for a rate-limit scope and caller identity
///
/// # Example
///
/// ```
/// use haven_cache::keys::rate_limit_key;
///
/// let key = rate_limit_key("payments", "user-42");
/// assert_eq!(key, "ratelimit:payments:user-42");
/// ```
pub fn rate_limit_key(scope: &str, identity: &str) -> String {
    format!("{}:{}:{}", RATE_LIMIT_PREFIX, scope, identity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_key() {
        assert_eq!(unit_key("u-1"), "unit:u-1");
    }

    #[test]
    fn test_rate_limit_key() {
        assert_eq!(rate_limit_key("auth", "1.2.3.4"), "ratelimit:auth:1.2.3.4");
        assert_eq!(
            rate_limit_key("payments", "user-42"),
            "ratelimit:payments:user-42"
        );
    }

    #[test]
    fn test_key_uniqueness() {
        let keys = vec![unit_key("123"), rate_limit_key("auth", "123")];
        let unique_count = keys.iter().collect::<std::collections::HashSet<_>>().len();
        assert_eq!(unique_count, keys.len());
    }
}
