//! Payment DTOs

use haven_core::models::PaymentAttempt;
use haven_mpesa::ReconciliationResult;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Push-payment initiation request
#[derive(Debug, Deserialize, Validate)]
pub struct InitiatePaymentRequest {
    #[validate(length(min = 1, max = 40))]
    pub booking_ref: String,

    /// Payer MSISDN in 254XXXXXXXXX format
    #[validate(length(min = 12, max = 12))]
    pub phone_number: String,
}

/// Push-payment initiation response
#[derive(Debug, Serialize)]
pub struct InitiatePaymentResponse {
    pub checkout_request_id: String,
    pub merchant_request_id: Option<String>,
    pub amount: Decimal,
    pub status: String,
}

impl From<PaymentAttempt> for InitiatePaymentResponse {
    fn from(attempt: PaymentAttempt) -> Self {
        Self {
            checkout_request_id: attempt.checkout_request_id,
            merchant_request_id: attempt.merchant_request_id,
            amount: attempt.amount,
            status: attempt.status.to_string(),
        }
    }
}

/// Payment status request
#[derive(Debug, Deserialize, Validate)]
pub struct PaymentStatusRequest {
    #[validate(length(min = 1, max = 120))]
    pub checkout_request_id: String,
}

/// Payment status response
///
/// A pending status is normal while the payer authorizes on their device;
/// the UI keeps polling.
#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    pub checkout_request_id: String,
    pub status: String,
    pub receipt: Option<String>,
    pub result_desc: Option<String>,
}

impl PaymentStatusResponse {
    /// Build from a reconciliation step result
    pub fn from_result(checkout_request_id: String, result: ReconciliationResult) -> Self {
        Self {
            checkout_request_id,
            status: result.status.to_string(),
            receipt: result.receipt,
            result_desc: result.result_desc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_length_validation() {
        let valid = InitiatePaymentRequest {
            booking_ref: "BK-1".to_string(),
            phone_number: "254712345678".to_string(),
        };
        assert!(valid.validate().is_ok());

        let invalid = InitiatePaymentRequest {
            booking_ref: "BK-1".to_string(),
            phone_number: "0712345678".to_string(),
        };
        assert!(invalid.validate().is_err());
    }
}
