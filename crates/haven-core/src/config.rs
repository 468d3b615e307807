//! Application configuration
//!
//! This module provides centralized configuration management using the `config`
//! crate. Configuration can be loaded from environment variables and config files.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub booking: BookingConfig,
    pub mpesa: MpesaConfig,
    pub rate_limit: RateLimitConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_timeout() -> u64 {
    30
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

/// Redis configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Default TTL for cached items in seconds
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_secs: u64,
}

fn default_pool_size() -> u32 {
    5
}

fn default_cache_ttl() -> u64 {
    300
}

/// Booking/reservation configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    /// How long a provisional hold blocks the calendar before the sweep
    /// reclaims it (minutes)
    #[serde(default = "default_provisional_ttl")]
    pub provisional_ttl_minutes: i64,

    /// Service fee rate applied to the nightly subtotal (0.12 = 12%)
    #[serde(default = "default_service_fee_rate")]
    pub service_fee_rate: f64,

    /// Interval between background sweeps of stale provisional holds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Guests may cancel up to this many hours before check-in
    #[serde(default = "default_cancellation_cutoff")]
    pub cancellation_cutoff_hours: i64,
}

fn default_provisional_ttl() -> i64 {
    15
}

fn default_service_fee_rate() -> f64 {
    0.12
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_cancellation_cutoff() -> i64 {
    24
}

/// M-Pesa (Daraja) gateway configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MpesaConfig {
    /// OAuth consumer key
    pub consumer_key: String,

    /// OAuth consumer secret
    pub consumer_secret: String,

    /// Paybill/till number the push is charged against
    #[serde(default = "default_short_code")]
    pub business_short_code: String,

    /// Lipa-na-M-Pesa passkey used to derive the request password
    pub passkey: String,

    /// "sandbox" or "production"
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Public URL the gateway posts push results back to
    pub callback_url: String,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,

    /// Delay between status polls in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Total polling budget before an attempt is timed out, in seconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Refresh the cached access token this many seconds before it expires
    #[serde(default = "default_token_margin")]
    pub token_refresh_margin_secs: u64,
}

fn default_short_code() -> String {
    "174379".to_string()
}

fn default_environment() -> String {
    "sandbox".to_string()
}

fn default_gateway_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    3
}

fn default_poll_timeout() -> u64 {
    120
}

fn default_token_margin() -> u64 {
    60
}

impl MpesaConfig {
    /// Base URL of the Daraja API for the configured environment
    pub fn base_url(&self) -> &'static str {
        if self.environment == "production" {
            "https://api.safaricom.co.ke"
        } else {
            "https://sandbox.safaricom.co.ke"
        }
    }
}

/// Rate limiter configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    /// Window length for authentication endpoints, in seconds
    #[serde(default = "default_auth_window")]
    pub auth_window_secs: u64,

    /// Maximum requests per window for authentication endpoints
    #[serde(default = "default_auth_max")]
    pub auth_max_requests: u32,

    /// Window length for payment endpoints, in seconds
    #[serde(default = "default_payment_window")]
    pub payment_window_secs: u64,

    /// Maximum requests per window for payment endpoints
    #[serde(default = "default_payment_max")]
    pub payment_max_requests: u32,
}

fn default_auth_window() -> u64 {
    900
}

fn default_auth_max() -> u32 {
    5
}

fn default_payment_window() -> u64 {
    60
}

fn default_payment_max() -> u32 {
    30
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            auth_window_secs: 900,
            auth_max_requests: 5,
            payment_window_secs: 60,
            payment_max_requests: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("server.timeout_secs", 30)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("redis.pool_size", 5)?
            .set_default("redis.default_ttl_secs", 300)?
            .set_default("booking.provisional_ttl_minutes", 15)?
            .set_default("booking.service_fee_rate", 0.12)?
            .set_default("booking.sweep_interval_secs", 60)?
            .set_default("booking.cancellation_cutoff_hours", 24)?
            .set_default("mpesa.business_short_code", "174379")?
            .set_default("mpesa.environment", "sandbox")?
            .set_default("mpesa.timeout_secs", 30)?
            .set_default("mpesa.poll_interval_secs", 3)?
            .set_default("mpesa.poll_timeout_secs", 120)?
            .set_default("mpesa.token_refresh_margin_secs", 60)?
            .set_default("rate_limit.auth_window_secs", 900)?
            .set_default("rate_limit.auth_max_requests", 5)?
            .set_default("rate_limit.payment_window_secs", 60)?
            .set_default("rate_limit.payment_max_requests", 30)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with HAVEN_ prefix
            .add_source(
                Environment::with_prefix("HAVEN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("HAVEN").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            provisional_ttl_minutes: 15,
            service_fee_rate: 0.12,
            sweep_interval_secs: 60,
            cancellation_cutoff_hours: 24,
        }
    }
}
