//! Reservation lifecycle manager
//!
//! Orchestrates a reservation from checkout to its terminal state:
//! - Create a provisional hold after an authoritative availability recheck
//! - Confirm once the payment gateway reports success (idempotent by receipt)
//! - Cancel, complete, dispute, and resolve along the lifecycle
//! - Sweep provisional holds whose TTL has lapsed
//!
//! The create and confirm paths run inside a database transaction with the
//! relevant rows locked `FOR UPDATE`: the earlier availability check is
//! advisory, only the in-transaction recheck decides. The exclusion
//! constraint on the reservations table backstops multi-process races.

use crate::availability::AvailabilityChecker;
use crate::constants::DEFAULT_SERVICE_FEE_RATE;
use crate::pricing;
use haven_core::{
    config::BookingConfig,
    models::{Reservation, ReservationStatus},
    traits::{ReservationRepository, UnitDirectory},
    AppError, AppResult,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Reservation lifecycle manager
pub struct ReservationManager<U, R>
where
    U: UnitDirectory,
    R: ReservationRepository,
{
    unit_dir: Arc<U>,
    reservation_repo: Arc<R>,
    pool: PgPool,
    provisional_ttl_minutes: i64,
    cancellation_cutoff_hours: i64,
    fallback_fee_rate: Decimal,
}

impl<U, R> ReservationManager<U, R>
where
    U: UnitDirectory,
    R: ReservationRepository,
{
    /// Create a new reservation manager
    pub fn new(
        unit_dir: Arc<U>,
        reservation_repo: Arc<R>,
        pool: PgPool,
        config: &BookingConfig,
    ) -> Self {
        Self {
            unit_dir,
            reservation_repo,
            pool,
            provisional_ttl_minutes: config.provisional_ttl_minutes,
            cancellation_cutoff_hours: config.cancellation_cutoff_hours,
            fallback_fee_rate: Decimal::from_f64(config.service_fee_rate)
                .unwrap_or(DEFAULT_SERVICE_FEE_RATE),
        }
    }

    /// Compute the authoritative price breakdown for a stay on a unit
    ///
    /// Pure recomputation from stored listing inputs; client-supplied
    /// totals are never trusted.
    #[instrument(skip(self))]
    pub async fn quote(
        &self,
        unit_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> AppResult<haven_core::models::Quote> {
        let unit = self
            .unit_dir
            .find_by_id(unit_id)
            .await?
            .ok_or_else(|| AppError::UnitNotFound(unit_id.to_string()))?;

        let mut fees = unit.fee_schedule();
        if fees.service_fee_rate <= Decimal::ZERO {
            fees.service_fee_rate = self.fallback_fee_rate;
        }

        pricing::quote_stay(unit.nightly_rate, &fees, start_date, end_date)
    }

    /// Create a provisional reservation
    ///
    /// Re-runs the availability check inside the transaction that performs
    /// the insert — the quote/check step and the commit step are separated
    /// in time, so the earlier answer is advisory only. The unit row is
    /// locked for the duration, serializing concurrent creates per unit.
    ///
    /// # Errors
    ///
    /// - `Validation` for a guest count outside the unit's capacity
    /// - `InvalidRange` for an empty or past date range
    /// - `DatesConflict` when the second, authoritative check finds an
    ///   overlapping stay
    #[instrument(skip(self))]
    pub async fn create_reservation(
        &self,
        unit_id: Uuid,
        requester_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        guests: i32,
    ) -> AppResult<Reservation> {
        AvailabilityChecker::<U, R>::validate_range(start_date, end_date)?;

        let unit = self
            .unit_dir
            .find_by_id(unit_id)
            .await?
            .ok_or_else(|| AppError::UnitNotFound(unit_id.to_string()))?;

        if !unit.active {
            return Err(AppError::UnitNotFound(unit_id.to_string()));
        }

        if !unit.accommodates(guests) {
            return Err(AppError::Validation(format!(
                "guest count {} outside unit capacity of {}",
                guests, unit.capacity
            )));
        }

        // Reclaim abandoned checkouts first; the exclusion constraint sees
        // swept rows as non-blocking, so this keeps the constraint and the
        // in-transaction recheck aligned.
        self.reservation_repo.expire_stale().await?;

        let mut fees = unit.fee_schedule();
        if fees.service_fee_rate <= Decimal::ZERO {
            fees.service_fee_rate = self.fallback_fee_rate;
        }
        let quote = pricing::quote_stay(unit.nightly_rate, &fees, start_date, end_date)?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        // Per-unit critical section: concurrent creates for this unit queue
        // up here until the winner commits.
        let locked: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM units WHERE id = $1 FOR UPDATE")
                .bind(unit_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    error!("Failed to lock unit: {}", e);
                    AppError::Database(format!("Failed to lock unit: {}", e))
                })?;

        if locked.is_none() {
            return Err(AppError::UnitNotFound(unit_id.to_string()));
        }

        // Authoritative availability check, same snapshot as the insert
        let conflict: Option<(NaiveDate, NaiveDate)> = sqlx::query_as(
            r#"
            SELECT start_date, end_date
            FROM reservations
            WHERE unit_id = $1
                AND status IN ('provisional', 'confirmed', 'completed')
                AND NOT (status = 'provisional' AND expires_at <= NOW())
                AND start_date < $3
                AND $2 < end_date
            ORDER BY start_date
            LIMIT 1
            "#,
        )
        .bind(unit_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to recheck availability: {}", e);
            AppError::Database(format!("Failed to recheck availability: {}", e))
        })?;

        if let Some((blocking_start, blocking_end)) = conflict {
            warn!(
                "Unit {} lost race for [{}, {}): blocked by [{}, {})",
                unit_id, start_date, end_date, blocking_start, blocking_end
            );
            return Err(AppError::DatesConflict {
                start: blocking_start,
                end: blocking_end,
            });
        }

        let reservation = Reservation::new(
            unit_id,
            requester_id,
            start_date,
            end_date,
            guests,
            &quote,
            self.provisional_ttl_minutes,
        );

        sqlx::query(
            r#"
            INSERT INTO reservations (
                id, booking_ref, unit_id, requester_id,
                start_date, end_date, guests, status,
                subtotal, cleaning_fee, service_fee, security_deposit, total,
                expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(reservation.id)
        .bind(&reservation.booking_ref)
        .bind(reservation.unit_id)
        .bind(reservation.requester_id)
        .bind(reservation.start_date)
        .bind(reservation.end_date)
        .bind(reservation.guests)
        .bind(reservation.status.to_string())
        .bind(reservation.subtotal)
        .bind(reservation.cleaning_fee)
        .bind(reservation.service_fee)
        .bind(reservation.security_deposit)
        .bind(reservation.total)
        .bind(reservation.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.code().as_deref() == Some("23P01") {
                    return AppError::Conflict(
                        "reservation dates overlap an existing stay".to_string(),
                    );
                }
            }
            error!("Failed to insert reservation: {}", e);
            AppError::Database(format!("Failed to insert reservation: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        info!(
            "Created provisional reservation {} on unit {} for [{}, {})",
            reservation.booking_ref, unit_id, start_date, end_date
        );

        Ok(reservation)
    }

    /// Confirm a reservation against a payment receipt
    ///
    /// Idempotent: confirming twice with the same receipt is a no-op that
    /// returns the already-confirmed reservation; a different receipt after
    /// confirmation is rejected with `AlreadyFinalized`.
    #[instrument(skip(self))]
    pub async fn confirm_reservation(
        &self,
        booking_ref: &str,
        receipt: &str,
    ) -> AppResult<Reservation> {
        let mut tx = self.begin_tx().await?;

        let row: Option<(Uuid, String)> = sqlx::query_as(
            "SELECT id, status FROM reservations WHERE booking_ref = $1 FOR UPDATE",
        )
        .bind(booking_ref)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::Database(format!("Failed to lock reservation: {}", e)))?;

        let (reservation_id, status) =
            row.ok_or_else(|| AppError::ReservationNotFound(booking_ref.to_string()))?;
        let status = ReservationStatus::from_str(&status)
            .ok_or_else(|| AppError::Internal(format!("unknown status {}", status)))?;

        let newly_confirmed =
            Self::apply_confirmation(&mut tx, reservation_id, status, booking_ref, receipt)
                .await?;

        // Stamp the receipt on the latest pending attempt. A confirmation
        // with no recorded push (operator-entered payment) gets a manual
        // attempt row instead — the attempt table is the single receipt
        // ledger, and the next confirm call must be able to compare
        // receipts against it.
        if newly_confirmed {
            let stamped = sqlx::query(
                r#"
                UPDATE payment_attempts
                SET status = 'completed',
                    receipt = $2,
                    updated_at = NOW()
                WHERE id = (
                    SELECT id FROM payment_attempts
                    WHERE reservation_id = $1 AND status = 'pending'
                    ORDER BY created_at DESC
                    LIMIT 1
                )
                "#,
            )
            .bind(reservation_id)
            .bind(receipt)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(format!("Failed to finalize attempt: {}", e)))?;

            if stamped.rows_affected() == 0 {
                sqlx::query(
                    r#"
                    INSERT INTO payment_attempts (
                        id, reservation_id, checkout_request_id, phone_number,
                        amount, status, receipt, result_code
                    )
                    SELECT $1, r.id, $2, '', r.total, 'completed', $3, '0'
                    FROM reservations r
                    WHERE r.id = $4
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(format!("MANUAL-{}", booking_ref))
                .bind(receipt)
                .bind(reservation_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::Database(format!("Failed to record manual payment: {}", e))
                })?;
            }
        }

        self.commit_tx(tx).await?;

        if newly_confirmed {
            info!("Confirmed reservation {} with receipt {}", booking_ref, receipt);
        }

        self.reservation_repo
            .find_by_id(reservation_id)
            .await?
            .ok_or_else(|| AppError::ReservationNotFound(booking_ref.to_string()))
    }

    /// Finalize a successful push-payment by its gateway correlation id
    ///
    /// Invoked by the reconciliation worker and the gateway callback.
    /// Attempt and reservation move together, all-or-nothing, and the
    /// receipt check makes a duplicate poll result or retried callback a
    /// no-op.
    #[instrument(skip(self))]
    pub async fn finalize_payment(
        &self,
        checkout_request_id: &str,
        receipt: &str,
    ) -> AppResult<Reservation> {
        let mut tx = self.begin_tx().await?;

        let attempt: Option<(Uuid, Uuid, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT id, reservation_id, status, receipt
            FROM payment_attempts
            WHERE checkout_request_id = $1
            FOR UPDATE
            "#,
        )
        .bind(checkout_request_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::Database(format!("Failed to lock payment attempt: {}", e)))?;

        let (attempt_id, reservation_id, attempt_status, recorded_receipt) = attempt
            .ok_or_else(|| AppError::PaymentNotFound(checkout_request_id.to_string()))?;

        if attempt_status == "completed" {
            // Duplicate finalization: a no-op for the same receipt, an
            // integrity failure for a different one.
            return match recorded_receipt.as_deref() {
                Some(r) if r == receipt => {
                    drop(tx);
                    self.reservation_repo
                        .find_by_id(reservation_id)
                        .await?
                        .ok_or_else(|| {
                            AppError::ReservationNotFound(reservation_id.to_string())
                        })
                }
                _ => Err(AppError::AlreadyFinalized(format!(
                    "attempt {} already completed with a different receipt",
                    checkout_request_id
                ))),
            };
        }

        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT booking_ref, status FROM reservations WHERE id = $1 FOR UPDATE",
        )
        .bind(reservation_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::Database(format!("Failed to lock reservation: {}", e)))?;

        let (booking_ref, status) =
            row.ok_or_else(|| AppError::ReservationNotFound(reservation_id.to_string()))?;
        let status = ReservationStatus::from_str(&status)
            .ok_or_else(|| AppError::Internal(format!("unknown status {}", status)))?;

        Self::apply_confirmation(&mut tx, reservation_id, status, &booking_ref, receipt).await?;

        sqlx::query(
            r#"
            UPDATE payment_attempts
            SET status = 'completed',
                receipt = $2,
                result_code = '0',
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(attempt_id)
        .bind(receipt)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(format!("Failed to finalize attempt: {}", e)))?;

        self.commit_tx(tx).await?;

        info!(
            "Finalized payment {} -> reservation {} confirmed, receipt {}",
            checkout_request_id, booking_ref, receipt
        );

        self.reservation_repo
            .find_by_id(reservation_id)
            .await?
            .ok_or_else(|| AppError::ReservationNotFound(booking_ref))
    }

    /// Cancel a provisional or confirmed reservation
    ///
    /// Requester-initiated cancellations respect the cutoff window before
    /// check-in; operator cancellations pass `enforce_cutoff = false`.
    #[instrument(skip(self))]
    pub async fn cancel_reservation(
        &self,
        booking_ref: &str,
        reason: Option<&str>,
        enforce_cutoff: bool,
    ) -> AppResult<Reservation> {
        let reservation = self.require_by_ref(booking_ref).await?;

        if !matches!(
            reservation.status,
            ReservationStatus::Provisional | ReservationStatus::Confirmed
        ) {
            return Err(AppError::AlreadyFinalized(format!(
                "reservation {} is {} and cannot be cancelled",
                booking_ref, reservation.status
            )));
        }

        if enforce_cutoff {
            let check_in = reservation
                .start_date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc())
                .unwrap_or_else(Utc::now);
            let hours_until = (check_in - Utc::now()).num_hours();
            if hours_until < self.cancellation_cutoff_hours {
                return Err(AppError::Validation(format!(
                    "reservations cannot be cancelled within {} hours of check-in",
                    self.cancellation_cutoff_hours
                )));
            }
        }

        let cancelled = self
            .reservation_repo
            .cancel(reservation.id, reservation.status, reason)
            .await?
            .ok_or_else(|| {
                AppError::AlreadyFinalized(format!(
                    "reservation {} changed state concurrently",
                    booking_ref
                ))
            })?;

        info!(
            "Cancelled reservation {} (was {})",
            booking_ref, reservation.status
        );

        Ok(cancelled)
    }

    /// Mark a confirmed stay as completed
    #[instrument(skip(self))]
    pub async fn complete_reservation(&self, booking_ref: &str) -> AppResult<Reservation> {
        self.transition(booking_ref, ReservationStatus::Completed)
            .await
    }

    /// Open a dispute on a confirmed stay
    #[instrument(skip(self))]
    pub async fn dispute_reservation(&self, booking_ref: &str) -> AppResult<Reservation> {
        self.transition(booking_ref, ReservationStatus::Disputed)
            .await
    }

    /// Close a dispute
    #[instrument(skip(self))]
    pub async fn resolve_dispute(&self, booking_ref: &str) -> AppResult<Reservation> {
        self.transition(booking_ref, ReservationStatus::Resolved)
            .await
    }

    /// Sweep provisional holds past their TTL, freeing their dates
    #[instrument(skip(self))]
    pub async fn expire_stale_provisionals(&self) -> AppResult<i64> {
        self.reservation_repo.expire_stale().await
    }

    /// List a requester's reservations, newest first
    pub async fn list_for_requester(
        &self,
        requester_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Reservation>> {
        self.reservation_repo
            .list_by_requester(requester_id, limit, offset)
            .await
    }

    /// Fetch a reservation by booking reference
    pub async fn get_by_ref(&self, booking_ref: &str) -> AppResult<Reservation> {
        self.require_by_ref(booking_ref).await
    }

    // ==================== internals ====================

    async fn require_by_ref(&self, booking_ref: &str) -> AppResult<Reservation> {
        self.reservation_repo
            .find_by_ref(booking_ref)
            .await?
            .ok_or_else(|| AppError::ReservationNotFound(booking_ref.to_string()))
    }

    async fn transition(
        &self,
        booking_ref: &str,
        next: ReservationStatus,
    ) -> AppResult<Reservation> {
        let reservation = self.require_by_ref(booking_ref).await?;

        if !reservation.status.can_transition_to(next) {
            return Err(AppError::AlreadyFinalized(format!(
                "reservation {} cannot move from {} to {}",
                booking_ref, reservation.status, next
            )));
        }

        self.reservation_repo
            .transition_status(reservation.id, reservation.status, next)
            .await?
            .ok_or_else(|| {
                AppError::AlreadyFinalized(format!(
                    "reservation {} changed state concurrently",
                    booking_ref
                ))
            })
    }

    /// Apply the provisional -> confirmed edge inside an open transaction.
    ///
    /// Returns `true` when the reservation was confirmed by this call and
    /// `false` for an idempotent re-confirmation with a matching receipt.
    async fn apply_confirmation(
        tx: &mut Transaction<'_, Postgres>,
        reservation_id: Uuid,
        current: ReservationStatus,
        booking_ref: &str,
        receipt: &str,
    ) -> AppResult<bool> {
        match current {
            // A provisional hold confirms even past its TTL as long as the
            // sweep has not reclaimed it: the payer's money is real.
            ReservationStatus::Provisional => {
                sqlx::query(
                    "UPDATE reservations SET status = 'confirmed', updated_at = NOW() WHERE id = $1",
                )
                .bind(reservation_id)
                .execute(&mut **tx)
                .await
                .map_err(|e| {
                    AppError::Database(format!("Failed to confirm reservation: {}", e))
                })?;
                Ok(true)
            }
            ReservationStatus::Confirmed => {
                let recorded: Option<(Option<String>,)> = sqlx::query_as(
                    r#"
                    SELECT receipt FROM payment_attempts
                    WHERE reservation_id = $1 AND status = 'completed'
                    "#,
                )
                .bind(reservation_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| AppError::Database(format!("Failed to read receipt: {}", e)))?;

                match recorded {
                    Some((Some(r),)) if r == receipt => Ok(false),
                    _ => Err(AppError::AlreadyFinalized(format!(
                        "reservation {} already confirmed with a different receipt",
                        booking_ref
                    ))),
                }
            }
            other => Err(AppError::AlreadyFinalized(format!(
                "reservation {} is {} and cannot be confirmed",
                booking_ref, other
            ))),
        }
    }

    async fn begin_tx(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })
    }

    async fn commit_tx(&self, tx: Transaction<'_, Postgres>) -> AppResult<()> {
        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })
    }
}

#[async_trait::async_trait]
impl<U, R> haven_core::traits::ReservationLifecycle for ReservationManager<U, R>
where
    U: UnitDirectory,
    R: ReservationRepository,
{
    async fn get_by_ref(&self, booking_ref: &str) -> AppResult<Reservation> {
        ReservationManager::get_by_ref(self, booking_ref).await
    }

    async fn finalize_payment(
        &self,
        checkout_request_id: &str,
        receipt: &str,
    ) -> AppResult<Reservation> {
        ReservationManager::finalize_payment(self, checkout_request_id, receipt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::tests::{
        date, reservation_on, sample_unit, MockReservationRepository, MockUnitDirectory,
    };
    use rust_decimal_macros::dec;

    type TestManager = ReservationManager<MockUnitDirectory, MockReservationRepository>;

    /// Lazy pool: never connects in tests that stay on repository paths
    fn lazy_pool() -> PgPool {
        PgPool::connect_lazy("postgresql://localhost/haven_test").unwrap()
    }

    fn manager(
        units: Vec<haven_core::models::Unit>,
        reservations: Vec<Reservation>,
    ) -> TestManager {
        ReservationManager::new(
            Arc::new(MockUnitDirectory { units }),
            Arc::new(MockReservationRepository::new(reservations)),
            lazy_pool(),
            &BookingConfig::default(),
        )
    }

    const YEAR: i32 = 2030;

    #[tokio::test]
    async fn test_quote_recomputes_breakdown() {
        let unit = sample_unit();
        let m = manager(vec![unit.clone()], vec![]);

        let quote = m
            .quote(unit.id, date(2024, 3, 1), date(2024, 3, 4))
            .await
            .unwrap();

        assert_eq!(quote.nights, 3);
        assert_eq!(quote.subtotal, dec!(300));
        assert_eq!(quote.service_fee, dec!(36));
        assert_eq!(quote.total, dec!(406));
    }

    #[tokio::test]
    async fn test_quote_unknown_unit() {
        let m = manager(vec![], vec![]);
        let err = m
            .quote(Uuid::new_v4(), date(2024, 3, 1), date(2024, 3, 4))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnitNotFound(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_guest_count() {
        let unit = sample_unit();
        let m = manager(vec![unit.clone()], vec![]);

        let err = m
            .create_reservation(
                unit.id,
                Uuid::new_v4(),
                date(YEAR, 3, 1),
                date(YEAR, 3, 4),
                0,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = m
            .create_reservation(
                unit.id,
                Uuid::new_v4(),
                date(YEAR, 3, 1),
                date(YEAR, 3, 4),
                9,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_range() {
        let unit = sample_unit();
        let m = manager(vec![unit.clone()], vec![]);

        let err = m
            .create_reservation(
                unit.id,
                Uuid::new_v4(),
                date(YEAR, 3, 4),
                date(YEAR, 3, 4),
                2,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRange(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_unit() {
        let m = manager(vec![], vec![]);

        let err = m
            .create_reservation(
                Uuid::new_v4(),
                Uuid::new_v4(),
                date(YEAR, 3, 1),
                date(YEAR, 3, 4),
                2,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnitNotFound(_)));
    }

    #[tokio::test]
    async fn test_cancel_provisional() {
        let unit = sample_unit();
        let res = reservation_on(
            unit.id,
            date(YEAR, 3, 1),
            date(YEAR, 3, 4),
            ReservationStatus::Provisional,
        );
        let booking_ref = res.booking_ref.clone();
        let m = manager(vec![unit], vec![res]);

        let cancelled = m
            .cancel_reservation(&booking_ref, Some("changed plans"), true)
            .await
            .unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
        assert_eq!(
            cancelled.cancellation_reason.as_deref(),
            Some("changed plans")
        );
    }

    #[tokio::test]
    async fn test_cancel_completed_rejected() {
        let unit = sample_unit();
        let res = reservation_on(
            unit.id,
            date(YEAR, 3, 1),
            date(YEAR, 3, 4),
            ReservationStatus::Completed,
        );
        let booking_ref = res.booking_ref.clone();
        let m = manager(vec![unit], vec![res]);

        let err = m
            .cancel_reservation(&booking_ref, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyFinalized(_)));
    }

    #[tokio::test]
    async fn test_cancel_respects_cutoff() {
        let unit = sample_unit();
        let tomorrow = Utc::now().date_naive() + chrono::Duration::days(1);
        let res = reservation_on(
            unit.id,
            tomorrow,
            tomorrow + chrono::Duration::days(3),
            ReservationStatus::Confirmed,
        );
        let booking_ref = res.booking_ref.clone();
        let m = manager(vec![unit], vec![res]);

        // Less than 24 hours before check-in: requester cancel blocked
        let err = m
            .cancel_reservation(&booking_ref, None, true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Operator override still works
        let cancelled = m
            .cancel_reservation(&booking_ref, Some("host request"), false)
            .await
            .unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_complete_confirmed() {
        let unit = sample_unit();
        let res = reservation_on(
            unit.id,
            date(YEAR, 3, 1),
            date(YEAR, 3, 4),
            ReservationStatus::Confirmed,
        );
        let booking_ref = res.booking_ref.clone();
        let m = manager(vec![unit], vec![res]);

        let completed = m.complete_reservation(&booking_ref).await.unwrap();
        assert_eq!(completed.status, ReservationStatus::Completed);
    }

    #[tokio::test]
    async fn test_complete_provisional_rejected() {
        let unit = sample_unit();
        let res = reservation_on(
            unit.id,
            date(YEAR, 3, 1),
            date(YEAR, 3, 4),
            ReservationStatus::Provisional,
        );
        let booking_ref = res.booking_ref.clone();
        let m = manager(vec![unit], vec![res]);

        let err = m.complete_reservation(&booking_ref).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyFinalized(_)));
    }

    #[tokio::test]
    async fn test_dispute_and_resolve() {
        let unit = sample_unit();
        let res = reservation_on(
            unit.id,
            date(YEAR, 3, 1),
            date(YEAR, 3, 4),
            ReservationStatus::Confirmed,
        );
        let booking_ref = res.booking_ref.clone();
        let m = manager(vec![unit], vec![res]);

        let disputed = m.dispute_reservation(&booking_ref).await.unwrap();
        assert_eq!(disputed.status, ReservationStatus::Disputed);

        let resolved = m.resolve_dispute(&booking_ref).await.unwrap();
        assert_eq!(resolved.status, ReservationStatus::Resolved);

        // Resolved is terminal
        let err = m.dispute_reservation(&booking_ref).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyFinalized(_)));
    }

    #[tokio::test]
    async fn test_expire_stale_provisionals() {
        let unit = sample_unit();
        let mut stale = reservation_on(
            unit.id,
            date(YEAR, 3, 1),
            date(YEAR, 3, 4),
            ReservationStatus::Provisional,
        );
        stale.expires_at = Utc::now() - chrono::Duration::minutes(30);
        let fresh = reservation_on(
            unit.id,
            date(YEAR, 4, 1),
            date(YEAR, 4, 4),
            ReservationStatus::Provisional,
        );
        let m = manager(vec![unit], vec![stale, fresh]);

        let swept = m.expire_stale_provisionals().await.unwrap();
        assert_eq!(swept, 1);
    }
}
