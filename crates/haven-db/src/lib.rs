//! Haven Database Layer
//!
//! This crate provides PostgreSQL database access and repository
//! implementations for the Haven reservation engine. It includes:
//!
//! - Connection pool management with sqlx
//! - Repository implementations for reservations, payment attempts, and units
//! - Embedded migrations, including the calendar-overlap exclusion constraint
//! - Conditional (compare-and-swap) status updates for lifecycle transitions

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use migrations::run_migrations;
pub use pool::create_pool;
pub use repositories::*;

// Re-export commonly used types
pub use haven_core::{AppError, AppResult};
pub use sqlx::{PgPool, Postgres, Transaction};
