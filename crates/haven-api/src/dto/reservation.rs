//! Reservation DTOs

use chrono::{DateTime, NaiveDate, Utc};
use haven_core::models::{Quote, Reservation};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Quote request: what would this stay cost?
#[derive(Debug, Deserialize, Validate)]
pub struct QuoteRequest {
    pub unit_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Price breakdown response
#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub nights: i64,
    pub subtotal: Decimal,
    pub service_fee: Decimal,
    pub cleaning_fee: Decimal,
    pub security_deposit: Decimal,
    pub total: Decimal,
}

impl From<Quote> for QuoteResponse {
    fn from(quote: Quote) -> Self {
        Self {
            nights: quote.nights,
            subtotal: quote.subtotal,
            service_fee: quote.service_fee,
            cleaning_fee: quote.cleaning_fee,
            security_deposit: quote.security_deposit,
            total: quote.total,
        }
    }
}

/// Availability check request
#[derive(Debug, Deserialize, Validate)]
pub struct AvailabilityRequest {
    pub unit_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Reservation creation request
///
/// No price fields: the breakdown is recomputed server-side from the
/// listing, so a tampered client total never reaches the books.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReservationRequest {
    pub unit_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(range(min = 1, max = 100))]
    pub guests: i32,
}

/// Cancellation request
#[derive(Debug, Deserialize, Validate)]
pub struct CancelReservationRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// Reservation response DTO
#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    pub booking_ref: String,
    pub unit_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub guests: i32,
    pub status: String,
    pub nights: i64,
    pub subtotal: Decimal,
    pub cleaning_fee: Decimal,
    pub service_fee: Decimal,
    pub security_deposit: Decimal,
    pub total: Decimal,
    pub expires_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Reservation> for ReservationResponse {
    fn from(r: Reservation) -> Self {
        Self {
            nights: r.nights(),
            booking_ref: r.booking_ref,
            unit_id: r.unit_id,
            start_date: r.start_date,
            end_date: r.end_date,
            guests: r.guests,
            status: r.status.to_string(),
            subtotal: r.subtotal,
            cleaning_fee: r.cleaning_fee,
            service_fee: r.service_fee,
            security_deposit: r.security_deposit,
            total: r.total,
            expires_at: r.expires_at,
            cancelled_at: r.cancelled_at,
            cancellation_reason: r.cancellation_reason,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_core::models::ReservationStatus;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reservation_response_serialization() {
        let quote = Quote {
            nights: 3,
            subtotal: dec!(300),
            service_fee: dec!(36),
            cleaning_fee: dec!(20),
            security_deposit: dec!(50),
            total: dec!(406),
        };
        let reservation = Reservation::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            2,
            &quote,
            15,
        );

        let response = ReservationResponse::from(reservation);
        assert_eq!(response.status, ReservationStatus::Provisional.to_string());
        assert_eq!(response.nights, 3);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"provisional\""));
        assert!(json.contains("\"total\":\"406\""));
    }

    #[test]
    fn test_create_request_guest_bounds() {
        let valid = CreateReservationRequest {
            unit_id: Uuid::new_v4(),
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            guests: 2,
        };
        assert!(valid.validate().is_ok());

        let invalid = CreateReservationRequest {
            guests: 0,
            ..valid
        };
        assert!(invalid.validate().is_err());
    }
}
