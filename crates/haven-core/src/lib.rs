//! Haven Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the Haven reservation engine. It includes:
//!
//! - Domain models (Unit, Reservation, PaymentAttempt, Quote)
//! - Common traits for repositories, counters, and the payment gateway
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod config;
pub mod error;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
