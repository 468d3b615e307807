//! Payment attempt repository implementation
//!
//! PostgreSQL-backed storage for push-payment attempts. The unique indexes
//! on `checkout_request_id`, `receipt`, and the one-completed-per-reservation
//! partial index are the durable side of the idempotency story.

use haven_core::{
    models::{PaymentAttempt, PaymentStatus},
    traits::{PaymentRepository, Repository},
    AppError, AppResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// Columns selected/returned for every payment attempt query
const PAYMENT_COLUMNS: &str = r#"
    id, reservation_id, checkout_request_id, merchant_request_id,
    phone_number, amount, status, receipt, result_code, result_desc,
    created_at, updated_at
"#;

/// PostgreSQL implementation of PaymentRepository
pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    /// Create a new payment repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Parse payment status from string
    fn parse_status(s: &str) -> PaymentStatus {
        PaymentStatus::from_str(s).unwrap_or(PaymentStatus::Pending)
    }
}

#[async_trait]
impl Repository<PaymentAttempt, Uuid> for PgPaymentRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<PaymentAttempt>> {
        let result = sqlx::query_as::<sqlx::Postgres, PaymentRow>(&format!(
            "SELECT {} FROM payment_attempts WHERE id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding payment attempt {}: {}", id, e);
            AppError::Database(format!("Failed to find payment attempt: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<PaymentAttempt>> {
        let rows = sqlx::query_as::<sqlx::Postgres, PaymentRow>(&format!(
            "SELECT {} FROM payment_attempts ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            PAYMENT_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing payment attempts: {}", e);
            AppError::Database(format!("Failed to fetch payment attempts: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn count(&self) -> AppResult<i64> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payment_attempts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting payment attempts: {}", e);
                AppError::Database(format!("Failed to count payment attempts: {}", e))
            })?;

        Ok(result.0)
    }

    #[instrument(skip(self, entity))]
    async fn create(&self, entity: &PaymentAttempt) -> AppResult<PaymentAttempt> {
        debug!(
            "Creating payment attempt for reservation {}",
            entity.reservation_id
        );

        let row = sqlx::query_as::<sqlx::Postgres, PaymentRow>(&format!(
            r#"
            INSERT INTO payment_attempts (
                id, reservation_id, checkout_request_id, merchant_request_id,
                phone_number, amount, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(entity.id)
        .bind(entity.reservation_id)
        .bind(&entity.checkout_request_id)
        .bind(&entity.merchant_request_id)
        .bind(&entity.phone_number)
        .bind(entity.amount)
        .bind(entity.status.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error creating payment attempt: {}", e);
            AppError::Database(format!("Failed to create payment attempt: {}", e))
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self, entity))]
    async fn update(&self, entity: &PaymentAttempt) -> AppResult<PaymentAttempt> {
        let row = sqlx::query_as::<sqlx::Postgres, PaymentRow>(&format!(
            r#"
            UPDATE payment_attempts
            SET status = $2,
                receipt = $3,
                result_code = $4,
                result_desc = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(entity.id)
        .bind(entity.status.to_string())
        .bind(&entity.receipt)
        .bind(&entity.result_code)
        .bind(&entity.result_desc)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error updating payment attempt {}: {}", entity.id, e);
            AppError::Database(format!("Failed to update payment attempt: {}", e))
        })?;

        Ok(row.into())
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    #[instrument(skip(self))]
    async fn find_by_checkout_request_id(
        &self,
        checkout_request_id: &str,
    ) -> AppResult<Option<PaymentAttempt>> {
        debug!("Finding payment attempt by correlation id");

        let result = sqlx::query_as::<sqlx::Postgres, PaymentRow>(&format!(
            "SELECT {} FROM payment_attempts WHERE checkout_request_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(checkout_request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding payment attempt: {}", e);
            AppError::Database(format!("Failed to find payment attempt: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_completed_by_reservation(
        &self,
        reservation_id: Uuid,
    ) -> AppResult<Option<PaymentAttempt>> {
        let result = sqlx::query_as::<sqlx::Postgres, PaymentRow>(&format!(
            r#"
            SELECT {}
            FROM payment_attempts
            WHERE reservation_id = $1 AND status = 'completed'
            LIMIT 1
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(reservation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding completed attempt: {}", e);
            AppError::Database(format!("Failed to find completed attempt: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_by_reservation(&self, reservation_id: Uuid) -> AppResult<Vec<PaymentAttempt>> {
        let rows = sqlx::query_as::<sqlx::Postgres, PaymentRow>(&format!(
            r#"
            SELECT {}
            FROM payment_attempts
            WHERE reservation_id = $1
            ORDER BY created_at DESC
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(reservation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing payment attempts: {}", e);
            AppError::Database(format!("Failed to list payment attempts: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn record_result(
        &self,
        id: Uuid,
        status: PaymentStatus,
        result_code: Option<&str>,
        result_desc: Option<&str>,
        receipt: Option<&str>,
    ) -> AppResult<PaymentAttempt> {
        debug!("Recording {} verdict on attempt {}", status, id);

        let row = sqlx::query_as::<sqlx::Postgres, PaymentRow>(&format!(
            r#"
            UPDATE payment_attempts
            SET status = $2,
                result_code = COALESCE($3, result_code),
                result_desc = COALESCE($4, result_desc),
                receipt = COALESCE($5, receipt),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .bind(status.to_string())
        .bind(result_code)
        .bind(result_desc)
        .bind(receipt)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error recording payment result: {}", e);
            AppError::Database(format!("Failed to record payment result: {}", e))
        })?;

        Ok(row.into())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    reservation_id: Uuid,
    checkout_request_id: String,
    merchant_request_id: Option<String>,
    phone_number: String,
    amount: Decimal,
    status: String,
    receipt: Option<String>,
    result_code: Option<String>,
    result_desc: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentRow> for PaymentAttempt {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: row.id,
            reservation_id: row.reservation_id,
            checkout_request_id: row.checkout_request_id,
            merchant_request_id: row.merchant_request_id,
            phone_number: row.phone_number,
            amount: row.amount,
            status: PgPaymentRepository::parse_status(&row.status),
            receipt: row.receipt,
            result_code: row.result_code,
            result_desc: row.result_desc,
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
            PgPaymentRepository::parse_status("pending"),
            PaymentStatus::Pending
        );
        assert_eq!(
            PgPaymentRepository::parse_status("completed"),
            PaymentStatus::Completed
        );
        assert_eq!(
            PgPaymentRepository::parse_status("unknown"),
            PaymentStatus::Pending
        );
    }
}
