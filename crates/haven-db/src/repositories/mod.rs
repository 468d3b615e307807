//! Repository implementations for the Haven reservation engine

pub mod payment_repo;
pub mod reservation_repo;
pub mod unit_repo;

pub use payment_repo::PgPaymentRepository;
pub use reservation_repo::PgReservationRepository;
pub use unit_repo::PgUnitDirectory;
