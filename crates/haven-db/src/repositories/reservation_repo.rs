//! Reservation repository implementation
//!
//! PostgreSQL-backed storage for reservations with conflict-aware inserts,
//! compare-and-swap status transitions, and the stale-hold sweep.

use haven_core::{
    models::{Reservation, ReservationStatus},
    traits::{Repository, ReservationRepository},
    AppError, AppResult,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

/// Columns selected/returned for every reservation query
const RESERVATION_COLUMNS: &str = r#"
    id, booking_ref, unit_id, requester_id,
    start_date, end_date, guests, status,
    subtotal, cleaning_fee, service_fee, security_deposit, total,
    expires_at, cancelled_at, cancellation_reason,
    created_at, updated_at
"#;

/// PostgreSQL implementation of ReservationRepository
pub struct PgReservationRepository {
    pool: PgPool,
}

impl PgReservationRepository {
    /// Create a new reservation repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Parse reservation status from string
    fn parse_status(s: &str) -> ReservationStatus {
        ReservationStatus::from_str(s).unwrap_or(ReservationStatus::Provisional)
    }

    /// Map insert errors, folding constraint violations into conflicts
    fn map_insert_error(e: sqlx::Error) -> AppError {
        if let sqlx::Error::Database(ref db_err) = e {
            match db_err.code().as_deref() {
                // Exclusion constraint: another blocking stay overlaps
                Some("23P01") => {
                    return AppError::Conflict(
                        "reservation dates overlap an existing stay".to_string(),
                    )
                }
                // Unique violation: booking_ref collision
                Some("23505") => {
                    return AppError::Conflict("booking reference already exists".to_string())
                }
                _ => {}
            }
        }
        error!("Database error creating reservation: {}", e);
        AppError::Database(format!("Failed to create reservation: {}", e))
    }
}

#[async_trait]
impl Repository<Reservation, Uuid> for PgReservationRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Reservation>> {
        debug!("Finding reservation by id: {}", id);

        let result = sqlx::query_as::<sqlx::Postgres, ReservationRow>(&format!(
            "SELECT {} FROM reservations WHERE id = $1",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding reservation {}: {}", id, e);
            AppError::Database(format!("Failed to find reservation: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<sqlx::Postgres, ReservationRow>(&format!(
            "SELECT {} FROM reservations ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            RESERVATION_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing reservations: {}", e);
            AppError::Database(format!("Failed to fetch reservations: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn count(&self) -> AppResult<i64> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reservations")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting reservations: {}", e);
                AppError::Database(format!("Failed to count reservations: {}", e))
            })?;

        Ok(result.0)
    }

    #[instrument(skip(self, entity))]
    async fn create(&self, entity: &Reservation) -> AppResult<Reservation> {
        debug!("Creating reservation {}", entity.booking_ref);

        let row = sqlx::query_as::<sqlx::Postgres, ReservationRow>(&format!(
            r#"
            INSERT INTO reservations (
                id, booking_ref, unit_id, requester_id,
                start_date, end_date, guests, status,
                subtotal, cleaning_fee, service_fee, security_deposit, total,
                expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            RESERVATION_COLUMNS
        ))
        .bind(entity.id)
        .bind(&entity.booking_ref)
        .bind(entity.unit_id)
        .bind(entity.requester_id)
        .bind(entity.start_date)
        .bind(entity.end_date)
        .bind(entity.guests)
        .bind(entity.status.to_string())
        .bind(entity.subtotal)
        .bind(entity.cleaning_fee)
        .bind(entity.service_fee)
        .bind(entity.security_deposit)
        .bind(entity.total)
        .bind(entity.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::map_insert_error)?;

        Ok(row.into())
    }

    #[instrument(skip(self, entity))]
    async fn update(&self, entity: &Reservation) -> AppResult<Reservation> {
        debug!("Updating reservation: {}", entity.id);

        let row = sqlx::query_as::<sqlx::Postgres, ReservationRow>(&format!(
            r#"
            UPDATE reservations
            SET status = $2,
                expires_at = $3,
                cancelled_at = $4,
                cancellation_reason = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            RESERVATION_COLUMNS
        ))
        .bind(entity.id)
        .bind(entity.status.to_string())
        .bind(entity.expires_at)
        .bind(entity.cancelled_at)
        .bind(&entity.cancellation_reason)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error updating reservation {}: {}", entity.id, e);
            AppError::Database(format!("Failed to update reservation: {}", e))
        })?;

        Ok(row.into())
    }
}

#[async_trait]
impl ReservationRepository for PgReservationRepository {
    #[instrument(skip(self))]
    async fn find_by_ref(&self, booking_ref: &str) -> AppResult<Option<Reservation>> {
        debug!("Finding reservation by ref: {}", booking_ref);

        let result = sqlx::query_as::<sqlx::Postgres, ReservationRow>(&format!(
            "SELECT {} FROM reservations WHERE booking_ref = $1",
            RESERVATION_COLUMNS
        ))
        .bind(booking_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding reservation by ref: {}", e);
            AppError::Database(format!("Failed to find reservation: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_blocking_conflict(
        &self,
        unit_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> AppResult<Option<Reservation>> {
        debug!(
            "Checking {} for conflicts in [{}, {})",
            unit_id, start_date, end_date
        );

        // Half-open overlap: existing.start < candidate.end AND
        // candidate.start < existing.end. Expired provisional holds no
        // longer block even before the sweep has reclaimed them.
        let result = sqlx::query_as::<sqlx::Postgres, ReservationRow>(&format!(
            r#"
            SELECT {}
            FROM reservations
            WHERE unit_id = $1
                AND status IN ('provisional', 'confirmed', 'completed')
                AND NOT (status = 'provisional' AND expires_at <= NOW())
                AND start_date < $3
                AND $2 < end_date
            ORDER BY start_date
            LIMIT 1
            "#,
            RESERVATION_COLUMNS
        ))
        .bind(unit_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error checking conflicts: {}", e);
            AppError::Database(format!("Failed to check conflicts: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_by_unit_and_status(
        &self,
        unit_id: Uuid,
        status: ReservationStatus,
    ) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<sqlx::Postgres, ReservationRow>(&format!(
            r#"
            SELECT {}
            FROM reservations
            WHERE unit_id = $1 AND status = $2
            ORDER BY start_date
            "#,
            RESERVATION_COLUMNS
        ))
        .bind(unit_id)
        .bind(status.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing unit reservations: {}", e);
            AppError::Database(format!("Failed to list reservations: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn list_by_requester(
        &self,
        requester_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<sqlx::Postgres, ReservationRow>(&format!(
            r#"
            SELECT {}
            FROM reservations
            WHERE requester_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            RESERVATION_COLUMNS
        ))
        .bind(requester_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing requester reservations: {}", e);
            AppError::Database(format!("Failed to list reservations: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn transition_status(
        &self,
        id: Uuid,
        expected: ReservationStatus,
        next: ReservationStatus,
    ) -> AppResult<Option<Reservation>> {
        debug!("Transitioning reservation {} {} -> {}", id, expected, next);

        let row = sqlx::query_as::<sqlx::Postgres, ReservationRow>(&format!(
            r#"
            UPDATE reservations
            SET status = $3,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .bind(expected.to_string())
        .bind(next.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error transitioning reservation {}: {}", id, e);
            AppError::Database(format!("Failed to transition reservation: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn cancel(
        &self,
        id: Uuid,
        expected: ReservationStatus,
        reason: Option<&str>,
    ) -> AppResult<Option<Reservation>> {
        debug!("Cancelling reservation {} from {}", id, expected);

        let row = sqlx::query_as::<sqlx::Postgres, ReservationRow>(&format!(
            r#"
            UPDATE reservations
            SET status = 'cancelled',
                cancelled_at = NOW(),
                cancellation_reason = $3,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .bind(expected.to_string())
        .bind(reason)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error cancelling reservation {}: {}", id, e);
            AppError::Database(format!("Failed to cancel reservation: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn expire_stale(&self) -> AppResult<i64> {
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET status = 'cancelled',
                cancelled_at = NOW(),
                cancellation_reason = 'provisional hold expired',
                updated_at = NOW()
            WHERE status = 'provisional'
                AND expires_at <= NOW()
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error expiring stale holds: {}", e);
            AppError::Database(format!("Failed to expire stale holds: {}", e))
        })?;

        let swept = result.rows_affected() as i64;

        if swept > 0 {
            warn!("Swept {} stale provisional holds", swept);
        }

        Ok(swept)
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    booking_ref: String,
    unit_id: Uuid,
    requester_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    guests: i32,
    status: String,
    subtotal: Decimal,
    cleaning_fee: Decimal,
    service_fee: Decimal,
    security_deposit: Decimal,
    total: Decimal,
    expires_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReservationRow> for Reservation {
    fn from(row: ReservationRow) -> Self {
        Self {
            id: row.id,
            booking_ref: row.booking_ref,
            unit_id: row.unit_id,
            requester_id: row.requester_id,
            start_date: row.start_date,
            end_date: row.end_date,
            guests: row.guests,
            status: PgReservationRepository::parse_status(&row.status),
            subtotal: row.subtotal,
            cleaning_fee: row.cleaning_fee,
            service_fee: row.service_fee,
            security_deposit: row.security_deposit,
            total: row.total,
            expires_at: row.expires_at,
            cancelled_at: row.cancelled_at,
            cancellation_reason: row.cancellation_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(
            PgReservationRepository::parse_status("provisional"),
            ReservationStatus::Provisional
        );
        assert_eq!(
            PgReservationRepository::parse_status("confirmed"),
            ReservationStatus::Confirmed
        );
        assert_eq!(
            PgReservationRepository::parse_status("resolved"),
            ReservationStatus::Resolved
        );
        // Unknown statuses fall back to provisional, the most conservative
        // state for availability purposes
        assert_eq!(
            PgReservationRepository::parse_status("garbage"),
            ReservationStatus::Provisional
        );
    }
}
