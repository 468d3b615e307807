//! Payment attempt model
//!
//! One row per push-payment sent to the gateway. The gateway's correlation
//! id ties a later status query back to the original push; the receipt is
//! the idempotency anchor for finalization.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Payment attempt status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Push sent, outcome not yet known
    #[default]
    Pending,
    /// Gateway reported success; receipt recorded
    Completed,
    /// Gateway reported failure; the reservation may retry
    Failed,
    /// Payer declined or duplicate push; the reservation may retry
    Cancelled,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Failed => write!(f, "failed"),
            PaymentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl PaymentStatus {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            "cancelled" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }

    /// Check if the attempt has reached a final verdict
    pub fn is_final(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

/// Payment attempt entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAttempt {
    /// Unique identifier (UUID)
    pub id: Uuid,

    /// Reservation this attempt pays for
    pub reservation_id: Uuid,

    /// Gateway correlation id (CheckoutRequestID), unique per push
    pub checkout_request_id: String,

    /// Gateway-side merchant request id
    pub merchant_request_id: Option<String>,

    /// Payer's phone number (MSISDN, 2547XXXXXXXX)
    pub phone_number: String,

    /// Amount charged
    pub amount: Decimal,

    /// Current status
    pub status: PaymentStatus,

    /// Gateway receipt, present only once completed; globally unique
    pub receipt: Option<String>,

    /// Last result code returned by the gateway
    pub result_code: Option<String>,

    /// Last result description returned by the gateway
    pub result_desc: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl PaymentAttempt {
    /// Create a new pending attempt for a freshly initiated push
    pub fn new(
        reservation_id: Uuid,
        checkout_request_id: String,
        merchant_request_id: Option<String>,
        phone_number: String,
        amount: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            reservation_id,
            checkout_request_id,
            merchant_request_id,
            phone_number,
            amount,
            status: PaymentStatus::Pending,
            receipt: None,
            result_code: None,
            result_desc: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_finality() {
        assert!(!PaymentStatus::Pending.is_final());
        assert!(PaymentStatus::Completed.is_final());
        assert!(PaymentStatus::Failed.is_final());
        assert!(PaymentStatus::Cancelled.is_final());
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
            PaymentStatus::Cancelled,
        ] {
            assert_eq!(PaymentStatus::from_str(&status.to_string()), Some(status));
        }
        assert_eq!(PaymentStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_new_attempt() {
        let attempt = PaymentAttempt::new(
            Uuid::new_v4(),
            "ws_CO_123".to_string(),
            Some("mr-1".to_string()),
            "254712345678".to_string(),
            dec!(406),
        );
        assert_eq!(attempt.status, PaymentStatus::Pending);
        assert!(attempt.receipt.is_none());
        assert_eq!(attempt.amount, dec!(406));
    }
}
