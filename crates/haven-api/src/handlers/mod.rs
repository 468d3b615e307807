//! HTTP handlers for the Haven API

pub mod payment;
pub mod reservation;

pub use payment::configure as configure_payments;
pub use reservation::configure as configure_reservations;
