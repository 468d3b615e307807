//! Payment reconciliation
//!
//! Drives a push-payment attempt to its final verdict: initiates the push,
//! polls the gateway with a bounded backoff, maps gateway result codes to
//! domain outcomes, and hands successes to the lifecycle manager for an
//! all-or-nothing finalize. The push callback channel lands in the same
//! finalize path, so polling and callbacks are idempotent with each other.
//!
//! Outcome mapping:
//!
//! | Gateway signal                  | Domain outcome                       |
//! |---------------------------------|--------------------------------------|
//! | response 0, result 0            | attempt completed, reservation confirmed |
//! | response 0, result 1032         | attempt cancelled, reservation stays provisional |
//! | response 0, any other result    | attempt failed, reservation stays provisional |
//! | response 1037                   | still processing, re-poll            |
//! | anything else / transport error | still processing, re-poll until the cap |
//!
//! When the polling budget runs out the attempt is left pending and the
//! provisional TTL sweep reclaims the reservation's dates.

use crate::types::StkCallback;
use haven_core::{
    config::MpesaConfig,
    models::{PaymentAttempt, PaymentStatus, ReservationStatus},
    traits::{
        GatewayStatus, PaymentGateway, PaymentRepository, PushPaymentRequest,
        ReservationLifecycle,
    },
    AppError, AppResult,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Domain outcome of one gateway status verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Paid; confirm the reservation with this receipt
    Confirmed { receipt: String },
    /// Payer declined or duplicate push; the reservation may retry
    CancelledByUser,
    /// Push failed; the reservation may retry
    Failed { code: String, desc: String },
    /// No verdict yet; keep polling
    Processing,
}

/// Map a gateway status verdict to a domain outcome
///
/// Unknown response codes deliberately map to `Processing`: an ambiguous
/// answer is retried until the polling budget runs out rather than guessed
/// at.
pub fn map_outcome(status: &GatewayStatus, checkout_request_id: &str) -> PaymentOutcome {
    match status.response_code.as_str() {
        "0" => match status.result_code.as_deref() {
            Some("0") => PaymentOutcome::Confirmed {
                receipt: status
                    .receipt
                    .clone()
                    .unwrap_or_else(|| format!("MPESA-{}", checkout_request_id)),
            },
            Some("1032") => PaymentOutcome::CancelledByUser,
            Some(code) => PaymentOutcome::Failed {
                code: code.to_string(),
                desc: status
                    .result_desc
                    .clone()
                    .unwrap_or_else(|| "push payment failed".to_string()),
            },
            None => PaymentOutcome::Processing,
        },
        // The gateway is still working on the push
        "1037" => PaymentOutcome::Processing,
        _ => PaymentOutcome::Processing,
    }
}

/// Current state of an attempt as seen by callers of the status endpoint
#[derive(Debug, Clone)]
pub struct ReconciliationResult {
    pub status: PaymentStatus,
    pub receipt: Option<String>,
    pub result_desc: Option<String>,
}

impl ReconciliationResult {
    fn from_attempt(attempt: &PaymentAttempt) -> Self {
        Self {
            status: attempt.status,
            receipt: attempt.receipt.clone(),
            result_desc: attempt.result_desc.clone(),
        }
    }

    fn pending() -> Self {
        Self {
            status: PaymentStatus::Pending,
            receipt: None,
            result_desc: None,
        }
    }
}

/// Payment reconciliation worker
pub struct ReconciliationWorker<G, L, P>
where
    G: PaymentGateway,
    L: ReservationLifecycle,
    P: PaymentRepository,
{
    gateway: Arc<G>,
    lifecycle: Arc<L>,
    payment_repo: Arc<P>,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl<G, L, P> ReconciliationWorker<G, L, P>
where
    G: PaymentGateway,
    L: ReservationLifecycle,
    P: PaymentRepository,
{
    /// Create a worker with explicit polling bounds
    pub fn new(
        gateway: Arc<G>,
        lifecycle: Arc<L>,
        payment_repo: Arc<P>,
        poll_interval: Duration,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            lifecycle,
            payment_repo,
            poll_interval,
            poll_timeout,
        }
    }

    /// Create a worker with polling bounds from gateway configuration
    pub fn from_config(
        gateway: Arc<G>,
        lifecycle: Arc<L>,
        payment_repo: Arc<P>,
        config: &MpesaConfig,
    ) -> Self {
        Self::new(
            gateway,
            lifecycle,
            payment_repo,
            Duration::from_secs(config.poll_interval_secs),
            Duration::from_secs(config.poll_timeout_secs),
        )
    }

    /// Validate a payer MSISDN: 254 followed by a 1/7-prefixed 9-digit number
    pub fn validate_phone(phone: &str) -> AppResult<()> {
        let bytes = phone.as_bytes();
        let valid = bytes.len() == 12
            && phone.starts_with("254")
            && matches!(bytes[3], b'1' | b'7')
            && bytes.iter().all(|b| b.is_ascii_digit());

        if !valid {
            return Err(AppError::InvalidInput(
                "phone number must match 254XXXXXXXXX".to_string(),
            ));
        }
        Ok(())
    }

    /// Initiate a push-payment for a provisional reservation
    ///
    /// The charged amount is the stored reservation total — never a
    /// client-supplied figure.
    #[instrument(skip(self))]
    pub async fn initiate(&self, booking_ref: &str, phone: &str) -> AppResult<PaymentAttempt> {
        Self::validate_phone(phone)?;

        let reservation = self.lifecycle.get_by_ref(booking_ref).await?;

        if reservation.status != ReservationStatus::Provisional {
            return Err(AppError::AlreadyFinalized(format!(
                "reservation {} is {} and cannot take a payment",
                booking_ref, reservation.status
            )));
        }

        if reservation.is_expired(Utc::now()) {
            return Err(AppError::Validation(format!(
                "provisional hold on {} has expired; request the dates again",
                booking_ref
            )));
        }

        let request = PushPaymentRequest {
            phone_number: phone.to_string(),
            amount: reservation.total,
            account_reference: format!("BOOKING-{}", reservation.booking_ref),
            description: format!("Payment for booking {}", reservation.booking_ref),
        };

        let push = self.gateway.initiate_push(&request).await?;

        let attempt = PaymentAttempt::new(
            reservation.id,
            push.checkout_request_id,
            Some(push.merchant_request_id),
            phone.to_string(),
            reservation.total,
        );

        let created = self.payment_repo.create(&attempt).await?;

        info!(
            "Initiated push {} for reservation {} ({})",
            created.checkout_request_id, booking_ref, created.amount
        );

        Ok(created)
    }

    /// Run a single reconciliation step for an attempt
    ///
    /// Idempotent: an attempt that already reached a final verdict is
    /// returned as-is without touching the gateway. Transport errors leave
    /// the attempt pending — the caller re-polls.
    #[instrument(skip(self))]
    pub async fn reconcile_once(
        &self,
        checkout_request_id: &str,
    ) -> AppResult<ReconciliationResult> {
        let attempt = self
            .payment_repo
            .find_by_checkout_request_id(checkout_request_id)
            .await?
            .ok_or_else(|| AppError::PaymentNotFound(checkout_request_id.to_string()))?;

        if attempt.status.is_final() {
            return Ok(ReconciliationResult::from_attempt(&attempt));
        }

        let verdict = match self.gateway.query_status(checkout_request_id).await {
            Ok(v) => v,
            Err(AppError::GatewayUnavailable(e)) => {
                debug!("Gateway unreachable, attempt stays pending: {}", e);
                return Ok(ReconciliationResult::pending());
            }
            Err(e) => return Err(e),
        };

        match map_outcome(&verdict, checkout_request_id) {
            PaymentOutcome::Confirmed { receipt } => {
                self.lifecycle
                    .finalize_payment(checkout_request_id, &receipt)
                    .await?;
                info!(
                    "Payment {} completed with receipt {}",
                    checkout_request_id, receipt
                );
                Ok(ReconciliationResult {
                    status: PaymentStatus::Completed,
                    receipt: Some(receipt),
                    result_desc: verdict.result_desc,
                })
            }
            PaymentOutcome::CancelledByUser => {
                let updated = self
                    .payment_repo
                    .record_result(
                        attempt.id,
                        PaymentStatus::Cancelled,
                        verdict.result_code.as_deref(),
                        verdict.result_desc.as_deref(),
                        None,
                    )
                    .await?;
                info!("Payment {} cancelled by payer", checkout_request_id);
                Ok(ReconciliationResult::from_attempt(&updated))
            }
            PaymentOutcome::Failed { code, desc } => {
                let updated = self
                    .payment_repo
                    .record_result(
                        attempt.id,
                        PaymentStatus::Failed,
                        Some(&code),
                        Some(&desc),
                        None,
                    )
                    .await?;
                warn!("Payment {} failed: {} {}", checkout_request_id, code, desc);
                Ok(ReconciliationResult::from_attempt(&updated))
            }
            PaymentOutcome::Processing => {
                let updated = self
                    .payment_repo
                    .record_result(
                        attempt.id,
                        PaymentStatus::Pending,
                        verdict.result_code.as_deref(),
                        verdict.result_desc.as_deref(),
                        None,
                    )
                    .await?;
                Ok(ReconciliationResult::from_attempt(&updated))
            }
        }
    }

    /// Poll an attempt until it reaches a final verdict or the budget runs
    /// out
    ///
    /// On timeout the attempt is left pending and the reservation stays
    /// provisional, eligible for manual retry or the TTL sweep — never
    /// silently ambiguous between paid and unpaid.
    #[instrument(skip(self))]
    pub async fn poll_until_final(
        &self,
        checkout_request_id: &str,
    ) -> AppResult<ReconciliationResult> {
        let deadline = Instant::now() + self.poll_timeout;

        loop {
            let result = self.reconcile_once(checkout_request_id).await?;

            if result.status.is_final() {
                return Ok(result);
            }

            if Instant::now() + self.poll_interval > deadline {
                warn!(
                    "No final verdict for {} within {:?}; attempt left pending",
                    checkout_request_id, self.poll_timeout
                );
                return Err(AppError::GatewayUnavailable(format!(
                    "no verdict for {} within the polling budget",
                    checkout_request_id
                )));
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Apply a push callback from the gateway
    ///
    /// Lands in the same finalize path as polling; a callback for an
    /// already-finalized attempt with the same receipt is a no-op.
    #[instrument(skip(self, callback), fields(checkout_request_id = %callback.checkout_request_id))]
    pub async fn handle_callback(&self, callback: &StkCallback) -> AppResult<()> {
        let checkout_request_id = &callback.checkout_request_id;

        if callback.result_code == 0 {
            let receipt = callback
                .receipt()
                .unwrap_or_else(|| format!("MPESA-{}", checkout_request_id));
            self.lifecycle
                .finalize_payment(checkout_request_id, &receipt)
                .await?;
            info!(
                "Callback confirmed payment {} with receipt {}",
                checkout_request_id, receipt
            );
            return Ok(());
        }

        // Failure callbacks only update the attempt; the reservation stays
        // provisional for a retry or the TTL sweep
        match self
            .payment_repo
            .find_by_checkout_request_id(checkout_request_id)
            .await?
        {
            Some(attempt) if !attempt.status.is_final() => {
                let status = if callback.result_code == 1032 {
                    PaymentStatus::Cancelled
                } else {
                    PaymentStatus::Failed
                };
                self.payment_repo
                    .record_result(
                        attempt.id,
                        status,
                        Some(&callback.result_code.to_string()),
                        callback.result_desc.as_deref(),
                        None,
                    )
                    .await?;
                info!(
                    "Callback recorded {} for payment {}",
                    status, checkout_request_id
                );
            }
            Some(_) => {
                debug!(
                    "Callback for already-finalized payment {}, ignoring",
                    checkout_request_id
                );
            }
            None => {
                warn!(
                    "Callback for unknown correlation id {}",
                    checkout_request_id
                );
            }
        }

        Ok(())
    }
}
