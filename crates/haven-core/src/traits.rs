//! Common traits for repositories and collaborators
//!
//! Defines abstractions for database access, cached counters, and the
//! mobile-money gateway.

use crate::error::AppError;
use crate::models::{PaymentAttempt, PaymentStatus, Reservation, ReservationStatus, Unit};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Generic repository trait for CRUD operations
#[async_trait]
pub trait Repository<T, ID>: Send + Sync {
    /// Find entity by ID
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, AppError>;

    /// Find all entities with pagination
    async fn find_all(&self, limit: i64, offset: i64) -> Result<Vec<T>, AppError>;

    /// Count total entities
    async fn count(&self) -> Result<i64, AppError>;

    /// Create a new entity
    async fn create(&self, entity: &T) -> Result<T, AppError>;

    /// Update an existing entity
    async fn update(&self, entity: &T) -> Result<T, AppError>;
}

/// Read-only access to the listing directory
///
/// Units are owned by the listing side of the application; the reservation
/// engine never mutates them.
#[async_trait]
pub trait UnitDirectory: Send + Sync {
    /// Find a unit by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Unit>, AppError>;

    /// List active units with pagination
    async fn list_active(&self, limit: i64, offset: i64) -> Result<Vec<Unit>, AppError>;
}

/// Reservation repository trait with specialized methods
#[async_trait]
pub trait ReservationRepository: Repository<Reservation, Uuid> {
    /// Find a reservation by its booking reference
    async fn find_by_ref(&self, booking_ref: &str) -> Result<Option<Reservation>, AppError>;

    /// Find a reservation blocking the candidate half-open range on a unit,
    /// if any. Only unexpired provisional, confirmed, and completed stays
    /// are considered.
    async fn find_blocking_conflict(
        &self,
        unit_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Option<Reservation>, AppError>;

    /// List reservations for a unit filtered by status
    async fn list_by_unit_and_status(
        &self,
        unit_id: Uuid,
        status: ReservationStatus,
    ) -> Result<Vec<Reservation>, AppError>;

    /// List a requester's reservations, newest first
    async fn list_by_requester(
        &self,
        requester_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Reservation>, AppError>;

    /// Compare-and-swap status transition. Returns `None` when the row was
    /// not in the expected status (lost race or illegal transition).
    async fn transition_status(
        &self,
        id: Uuid,
        expected: ReservationStatus,
        next: ReservationStatus,
    ) -> Result<Option<Reservation>, AppError>;

    /// Cancel a reservation currently in the expected status, recording the
    /// reason. Returns `None` on a CAS miss.
    async fn cancel(
        &self,
        id: Uuid,
        expected: ReservationStatus,
        reason: Option<&str>,
    ) -> Result<Option<Reservation>, AppError>;

    /// Move provisional holds past their TTL to cancelled, freeing their
    /// date ranges. Returns the number of rows swept.
    async fn expire_stale(&self) -> Result<i64, AppError>;
}

/// Payment attempt repository trait with specialized methods
#[async_trait]
pub trait PaymentRepository: Repository<PaymentAttempt, Uuid> {
    /// Find an attempt by the gateway correlation id
    async fn find_by_checkout_request_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<PaymentAttempt>, AppError>;

    /// Find the completed attempt for a reservation, if any
    async fn find_completed_by_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<PaymentAttempt>, AppError>;

    /// List all attempts for a reservation, newest first
    async fn list_by_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Vec<PaymentAttempt>, AppError>;

    /// Record a gateway verdict on an attempt. Receipt is only set for
    /// completed attempts.
    async fn record_result(
        &self,
        id: Uuid,
        status: PaymentStatus,
        result_code: Option<&str>,
        result_desc: Option<&str>,
        receipt: Option<&str>,
    ) -> Result<PaymentAttempt, AppError>;
}

/// Cache service trait
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Get value from cache
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError>;

    /// Set value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), AppError>;

    /// Delete value from cache
    async fn delete(&self, key: &str) -> Result<bool, AppError>;

    /// Check if key exists
    async fn exists(&self, key: &str) -> Result<bool, AppError>;
}

/// State of a fixed rate-limit window after a hit
#[derive(Debug, Clone, Copy)]
pub struct WindowSnapshot {
    /// Requests seen in the current window, including this one
    pub count: u32,

    /// Time until the window rolls over
    pub reset_after: Duration,
}

/// Keyed fixed-window counter store
///
/// Single-instance deployments use a guarded in-process map; horizontally
/// scaled deployments must back this with a shared store or the limit is
/// only enforced per instance.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Count a hit against `key`'s current window, opening a fresh window
    /// when none exists or the previous one has elapsed.
    async fn hit(&self, key: &str, window: Duration) -> Result<WindowSnapshot, AppError>;
}

/// Lifecycle operations the payment reconciliation worker drives
///
/// The worker never mutates reservations itself; it hands gateway outcomes
/// to the lifecycle manager, which owns the state machine.
#[async_trait]
pub trait ReservationLifecycle: Send + Sync {
    /// Fetch a reservation by booking reference
    async fn get_by_ref(&self, booking_ref: &str) -> Result<Reservation, AppError>;

    /// Finalize a successful push-payment: complete the attempt and confirm
    /// the reservation, all-or-nothing, idempotent by receipt.
    async fn finalize_payment(
        &self,
        checkout_request_id: &str,
        receipt: &str,
    ) -> Result<Reservation, AppError>;
}

/// Push-payment request sent to the gateway
#[derive(Debug, Clone)]
pub struct PushPaymentRequest {
    /// Payer MSISDN (2547XXXXXXXX)
    pub phone_number: String,

    /// Amount to charge
    pub amount: Decimal,

    /// Merchant-side reference shown on the payer's statement
    pub account_reference: String,

    /// Human-readable description of the charge
    pub description: String,
}

/// Gateway acknowledgement of an accepted push
#[derive(Debug, Clone)]
pub struct PushPaymentResponse {
    /// Gateway-side merchant request id
    pub merchant_request_id: String,

    /// Correlation id used for later status queries
    pub checkout_request_id: String,
}

/// Gateway verdict for a status query
#[derive(Debug, Clone, Default)]
pub struct GatewayStatus {
    /// Outer response code ("0" = query understood)
    pub response_code: String,

    /// Result of the push itself ("0" = paid)
    pub result_code: Option<String>,

    /// Human-readable result description
    pub result_desc: Option<String>,

    /// Receipt number, present on success
    pub receipt: Option<String>,
}

/// Mobile-money gateway client
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Ask the gateway to prompt the payer's device for authorization
    async fn initiate_push(
        &self,
        request: &PushPaymentRequest,
    ) -> Result<PushPaymentResponse, AppError>;

    /// Query the outcome of a previously initiated push
    async fn query_status(&self, checkout_request_id: &str) -> Result<GatewayStatus, AppError>;
}
