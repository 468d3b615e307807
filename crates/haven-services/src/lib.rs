//! Business logic services for the Haven reservation engine
//!
//! This crate contains the services that orchestrate reservations:
//! quoting, availability checking, the reservation lifecycle, and request
//! throttling.
//!
//! # Architecture
//!
//! Services are designed to be composable and testable:
//! - Each service owns its dependencies (repositories, counter stores)
//! - Services are wrapped in Arc for safe sharing across async tasks
//! - All operations are instrumented with tracing
//! - Comprehensive error handling with AppError
//!
//! # Services
//!
//! - `pricing` - Pure price breakdown computation for a stay
//! - `AvailabilityChecker` - Conflict detection against the unit calendar
//! - `ReservationManager` - Reservation lifecycle state machine
//! - `RateLimiter` - Fixed-window request throttling over a counter store
//! - `CachedUnitDirectory` - Read-through cache over the listing directory

pub mod availability;
pub mod pricing;
pub mod rate_limit;
pub mod reservation_manager;
pub mod units;

pub use availability::{Availability, AvailabilityChecker, BlockingStay};
pub use rate_limit::{MemoryCounterStore, RateDecision, RateLimiter};
pub use reservation_manager::ReservationManager;
pub use units::CachedUnitDirectory;

/// Business logic constants
pub mod constants {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    /// How long a provisional hold blocks the calendar (minutes)
    pub const PROVISIONAL_TTL_MINUTES: i64 = 15;

    /// Service fee rate applied when a listing carries none
    pub const DEFAULT_SERVICE_FEE_RATE: Decimal = dec!(0.12);

    /// Counter scope for authentication endpoints
    pub const AUTH_RATE_SCOPE: &str = "auth";

    /// Counter scope for payment endpoints
    pub const PAYMENTS_RATE_SCOPE: &str = "payments";
}
