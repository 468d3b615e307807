//! Embedded database migrations
//!
//! SQL files under `migrations/` are compiled into the binary by
//! `sqlx::migrate!` and applied in order on startup. Never modify an
//! applied migration, always add a new one.

use haven_core::{AppError, AppResult};
use sqlx::PgPool;
use tracing::info;

/// Embedded migrations from the crate's `migrations/` directory
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Apply any pending migrations
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    info!("Running database migrations");

    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| AppError::Database(format!("Migration failed: {}", e)))?;

    info!("Database migrations up to date");
    Ok(())
}
