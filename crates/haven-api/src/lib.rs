//! API layer for the Haven reservation engine
//!
//! HTTP handlers for quoting, availability, reservations, and payments.

pub mod dto;
pub mod handlers;
pub mod identity;

use haven_cache::RedisCache;
use haven_core::config::RateLimitConfig;
use haven_core::traits::CounterStore;
use haven_db::{PgPaymentRepository, PgReservationRepository, PgUnitDirectory};
use haven_mpesa::{MpesaClient, ReconciliationWorker};
use haven_services::{
    constants::{AUTH_RATE_SCOPE, PAYMENTS_RATE_SCOPE},
    AvailabilityChecker, CachedUnitDirectory, RateLimiter, ReservationManager,
};
use std::sync::Arc;
use std::time::Duration;

// Re-export DTOs (common types)
pub use dto::ApiResponse;

// Re-export handler configuration functions
pub use handlers::{configure_payments, configure_reservations};

pub use identity::Requester;

/// Concrete unit directory: PostgreSQL behind a Redis read-through cache
pub type Units = CachedUnitDirectory<PgUnitDirectory, RedisCache>;

/// Concrete availability checker wired to PostgreSQL
pub type Checker = AvailabilityChecker<Units, PgReservationRepository>;

/// Concrete lifecycle manager wired to PostgreSQL
pub type Manager = ReservationManager<Units, PgReservationRepository>;

/// Concrete reconciliation worker wired to Daraja and PostgreSQL
pub type Worker = ReconciliationWorker<MpesaClient, Manager, PgPaymentRepository>;

/// The limiter instances guarding the engine's endpoints
///
/// `payments` throttles `/payments/initiate` and `/payments/status`.
/// `auth` is mounted in front of the session layer's authentication
/// endpoints by the embedding application; it lives here so both scopes
/// share one counter store and one configuration surface.
pub struct RateLimiters {
    pub auth: RateLimiter,
    pub payments: RateLimiter,
}

impl RateLimiters {
    /// Build both limiter instances over a shared counter store
    pub fn from_config(config: &RateLimitConfig, store: Arc<dyn CounterStore>) -> Self {
        Self {
            auth: RateLimiter::new(
                AUTH_RATE_SCOPE,
                Duration::from_secs(config.auth_window_secs),
                config.auth_max_requests,
                store.clone(),
            ),
            payments: RateLimiter::new(
                PAYMENTS_RATE_SCOPE,
                Duration::from_secs(config.payment_window_secs),
                config.payment_max_requests,
                store,
            ),
        }
    }
}
