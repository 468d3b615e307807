//! Payment handlers
//!
//! HTTP handlers for push-payment initiation, status polling, and the
//! gateway callback. The initiate and status endpoints sit behind the
//! payments rate limiter; throttled callers get a 429 with retry metadata.

use crate::dto::{
    ApiResponse, InitiatePaymentRequest, InitiatePaymentResponse, PaymentStatusRequest,
    PaymentStatusResponse,
};
use crate::identity::Requester;
use crate::{RateLimiters, Worker};
use actix_web::{web, HttpResponse};
use haven_core::AppError;
use haven_mpesa::types::{CallbackAck, CallbackEnvelope};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

/// Initiate a push-payment for a provisional reservation
///
/// POST /api/v1/payments/initiate
///
/// Sends the STK push and spawns a bounded background poll so the
/// reservation converges even if the client never polls.
#[instrument(skip(worker, limiters, requester))]
pub async fn initiate_payment(
    worker: web::Data<Worker>,
    limiters: web::Data<RateLimiters>,
    requester: Requester,
    req: web::Json<InitiatePaymentRequest>,
) -> Result<HttpResponse, AppError> {
    limiters.payments.enforce(&requester.id.to_string()).await?;

    req.validate().map_err(AppError::from)?;

    let attempt = worker.initiate(&req.booking_ref, &req.phone_number).await?;
    let checkout_request_id = attempt.checkout_request_id.clone();

    // Background reconciliation: bounded poll, then the TTL sweep owns
    // whatever is still unresolved
    let poller: Arc<Worker> = worker.clone().into_inner();
    tokio::spawn(async move {
        if let Err(e) = poller.poll_until_final(&checkout_request_id).await {
            warn!(
                "Background reconciliation for {} ended without a verdict: {}",
                checkout_request_id, e
            );
        }
    });

    info!(
        "Requester {} initiated payment for {}",
        requester.id, req.booking_ref
    );

    Ok(HttpResponse::Accepted().json(ApiResponse::with_message(
        InitiatePaymentResponse::from(attempt),
        "push sent; authorize on your device",
    )))
}

/// Poll the outcome of a push-payment
///
/// POST /api/v1/payments/status
///
/// Runs one reconciliation step and returns the attempt's current state;
/// a pending answer means the payer has not authorized yet and the UI
/// should poll again. 429 with `X-RateLimit-Remaining`/`X-RateLimit-Reset`
/// when throttled.
#[instrument(skip(worker, limiters, requester))]
pub async fn payment_status(
    worker: web::Data<Worker>,
    limiters: web::Data<RateLimiters>,
    requester: Requester,
    req: web::Json<PaymentStatusRequest>,
) -> Result<HttpResponse, AppError> {
    limiters.payments.enforce(&requester.id.to_string()).await?;

    req.validate().map_err(AppError::from)?;

    let result = worker.reconcile_once(&req.checkout_request_id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(PaymentStatusResponse::from_result(
        req.into_inner().checkout_request_id,
        result,
    ))))
}

/// Receive the gateway's push callback
///
/// POST /api/v1/payments/callback
///
/// Always acknowledged with ResultCode 0 — a non-zero ack makes the
/// gateway retry, and the finalize path is idempotent anyway.
#[instrument(skip(worker, envelope))]
pub async fn payment_callback(
    worker: web::Data<Worker>,
    envelope: web::Json<CallbackEnvelope>,
) -> HttpResponse {
    let callback = &envelope.body.stk_callback;

    if let Err(e) = worker.handle_callback(callback).await {
        error!(
            "Failed to apply callback for {}: {}",
            callback.checkout_request_id, e
        );
    }

    HttpResponse::Ok().json(CallbackAck::ok())
}

/// Configure payment routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/payments")
            .route("/initiate", web::post().to(initiate_payment))
            .route("/status", web::post().to(payment_status))
            .route("/callback", web::post().to(payment_callback)),
    );
}
