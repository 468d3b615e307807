//! Unit directory implementation
//!
//! Read-only access to the listing directory's units table. Listing CRUD
//! lives with the listing side of the application; the reservation engine
//! only needs capacity and pricing inputs.

use haven_core::{models::Unit, traits::UnitDirectory, AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// Columns selected for every unit query
const UNIT_COLUMNS: &str = r#"
    id, name, capacity, nightly_rate, cleaning_fee,
    security_deposit, service_fee_rate, active,
    created_at, updated_at
"#;

/// PostgreSQL implementation of the unit directory
pub struct PgUnitDirectory {
    pool: PgPool,
}

impl PgUnitDirectory {
    /// Create a new unit directory
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitDirectory for PgUnitDirectory {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Unit>> {
        debug!("Finding unit by id: {}", id);

        let result = sqlx::query_as::<sqlx::Postgres, UnitRow>(&format!(
            "SELECT {} FROM units WHERE id = $1",
            UNIT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding unit {}: {}", id, e);
            AppError::Database(format!("Failed to find unit: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_active(&self, limit: i64, offset: i64) -> AppResult<Vec<Unit>> {
        let rows = sqlx::query_as::<sqlx::Postgres, UnitRow>(&format!(
            r#"
            SELECT {}
            FROM units
            WHERE active = TRUE
            ORDER BY name
            LIMIT $1 OFFSET $2
            "#,
            UNIT_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing units: {}", e);
            AppError::Database(format!("Failed to list units: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct UnitRow {
    id: Uuid,
    name: String,
    capacity: i32,
    nightly_rate: Decimal,
    cleaning_fee: Decimal,
    security_deposit: Decimal,
    service_fee_rate: Decimal,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UnitRow> for Unit {
    fn from(row: UnitRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            capacity: row.capacity,
            nightly_rate: row.nightly_rate,
            cleaning_fee: row.cleaning_fee,
            security_deposit: row.security_deposit,
            service_fee_rate: row.service_fee_rate,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
