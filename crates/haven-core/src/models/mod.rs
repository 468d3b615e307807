//! Domain models for the Haven reservation engine

pub mod payment;
pub mod quote;
pub mod reservation;
pub mod unit;

pub use payment::{PaymentAttempt, PaymentStatus};
pub use quote::{FeeSchedule, Quote};
pub use reservation::{Reservation, ReservationStatus};
pub use unit::Unit;
