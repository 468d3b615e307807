//! Unified error handling for Haven
//!
//! This module provides a comprehensive error type that covers all possible
//! failure scenarios in the reservation engine, with automatic HTTP response
//! mapping.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;

/// Main application error type
///
/// All errors in the application should be converted to this type.
/// It implements `ResponseError` for automatic HTTP response generation.
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Database Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    // ==================== Cache Errors ====================
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Cache connection failed: {0}")]
    CacheConnection(String),

    // ==================== Identity Errors ====================
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // ==================== Reservation Errors ====================
    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    #[error("Reservation not found: {0}")]
    ReservationNotFound(String),

    #[error("Payment attempt not found: {0}")]
    PaymentNotFound(String),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Dates unavailable: blocked by an existing stay from {start} to {end}")]
    DatesConflict { start: NaiveDate, end: NaiveDate },

    #[error("Reservation already finalized: {0}")]
    AlreadyFinalized(String),

    // ==================== Payment Gateway Errors ====================
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Payment gateway rejected request: {0}")]
    GatewayRejected(String),

    // ==================== Rate Limiting ====================
    #[error("Too many requests, please try again later")]
    RateLimited { remaining: u32, reset_after_secs: u64 },

    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ==================== Resource Errors ====================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::InvalidInput(_)
            | AppError::InvalidRange(_)
            | AppError::GatewayRejected(_) => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,

            // 404 Not Found
            AppError::UnitNotFound(_)
            | AppError::ReservationNotFound(_)
            | AppError::PaymentNotFound(_)
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::DatesConflict { .. }
            | AppError::AlreadyFinalized(_)
            | AppError::Conflict(_) => StatusCode::CONFLICT,

            // 422 Unprocessable Entity
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 502 Bad Gateway
            AppError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,

            // 500 Internal Server Error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::Transaction(_) => "transaction_error",
            AppError::Cache(_) => "cache_error",
            AppError::CacheConnection(_) => "cache_connection_error",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::UnitNotFound(_) => "unit_not_found",
            AppError::ReservationNotFound(_) => "reservation_not_found",
            AppError::PaymentNotFound(_) => "payment_not_found",
            AppError::InvalidRange(_) => "invalid_range",
            AppError::DatesConflict { .. } => "dates_conflict",
            AppError::AlreadyFinalized(_) => "already_finalized",
            AppError::GatewayUnavailable(_) => "gateway_unavailable",
            AppError::GatewayRejected(_) => "gateway_rejected",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        // Conflicting stays surface the blocking range so the UI can
        // suggest alternative dates; the requester is never exposed.
        if let AppError::DatesConflict { start, end } = self {
            body["conflict"] = json!({
                "start_date": start,
                "end_date": end,
            });
        }

        let mut builder = HttpResponse::build(status);

        // Throttled callers get standard retry metadata headers.
        if let AppError::RateLimited {
            remaining,
            reset_after_secs,
        } = self
        {
            builder.insert_header(("X-RateLimit-Remaining", remaining.to_string()));
            builder.insert_header(("X-RateLimit-Reset", reset_after_secs.to_string()));
            builder.insert_header(("Retry-After", reset_after_secs.to_string()));
        }

        builder.json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
