//! Request/response DTOs for the Haven API

pub mod common;
pub mod payment;
pub mod reservation;

pub use common::ApiResponse;
pub use payment::{
    InitiatePaymentRequest, InitiatePaymentResponse, PaymentStatusRequest, PaymentStatusResponse,
};
pub use reservation::{
    AvailabilityRequest, CancelReservationRequest, CreateReservationRequest, QuoteRequest,
    QuoteResponse, ReservationResponse,
};
