//! M-Pesa (Daraja) integration for the Haven reservation engine
//!
//! This crate owns everything that talks to the mobile-money gateway:
//!
//! - `MpesaClient` - OAuth token caching, STK push initiation, status queries
//! - `ReconciliationWorker` - maps gateway verdicts to domain outcomes and
//!   drives reservations to their final state through the lifecycle manager
//! - Callback handling for the push channel, idempotent with polling
//!
//! # Architecture
//!
//! ```text
//!  POST /payments/initiate ──> ReconciliationWorker::initiate
//!                                   │  STK push
//!                                   ▼
//!                              MpesaClient ───> Daraja API
//!                                   │
//!              bounded poll loop    ▼
//!  POST /payments/status  ──> reconcile_once ──> map_outcome
//!  POST /payments/callback ─────────┘                │
//!                                                    ▼
//!                              ReservationLifecycle::finalize_payment
//! ```

pub mod client;
pub mod reconciliation;
pub mod types;

pub use client::MpesaClient;
pub use reconciliation::{
    map_outcome, PaymentOutcome, ReconciliationResult, ReconciliationWorker,
};
