//! Reservation handlers
//!
//! HTTP handlers for quoting, availability, and the reservation lifecycle.
//! Operator transitions (complete/dispute/resolve) are mounted here too;
//! the embedding application's role layer gates who may reach them.

use crate::dto::{
    ApiResponse, AvailabilityRequest, CancelReservationRequest, CreateReservationRequest,
    QuoteRequest, QuoteResponse, ReservationResponse,
};
use crate::identity::Requester;
use crate::{Checker, Manager};
use actix_web::{web, HttpResponse};
use haven_core::AppError;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use validator::Validate;

/// Pagination for reservation listings
#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Quote a stay without reserving anything
///
/// POST /api/v1/reservations/quote
#[instrument(skip(manager))]
pub async fn quote(
    manager: web::Data<Manager>,
    req: web::Json<QuoteRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(AppError::from)?;

    let quote = manager
        .quote(req.unit_id, req.start_date, req.end_date)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(QuoteResponse::from(quote))))
}

/// Advisory availability check
///
/// POST /api/v1/reservations/availability
#[instrument(skip(checker))]
pub async fn check_availability(
    checker: web::Data<Checker>,
    req: web::Json<AvailabilityRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(AppError::from)?;

    let availability = checker
        .check(req.unit_id, req.start_date, req.end_date)
        .await?;

    Ok(HttpResponse::Ok().json(availability))
}

/// Create a provisional reservation
///
/// POST /api/v1/reservations
///
/// Returns 409 when the authoritative recheck finds a conflict and 422 on
/// validation failures.
#[instrument(skip(manager, requester))]
pub async fn create_reservation(
    manager: web::Data<Manager>,
    requester: Requester,
    req: web::Json<CreateReservationRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(AppError::from)?;

    if !requester.verified {
        return Err(AppError::Unauthorized(
            "account must be verified to reserve".to_string(),
        ));
    }

    let reservation = manager
        .create_reservation(
            req.unit_id,
            requester.id,
            req.start_date,
            req.end_date,
            req.guests,
        )
        .await?;

    info!(
        "Requester {} created reservation {}",
        requester.id, reservation.booking_ref
    );

    Ok(HttpResponse::Created().json(ApiResponse::success(ReservationResponse::from(reservation))))
}

/// List the requester's reservations
///
/// GET /api/v1/reservations
#[instrument(skip(manager, requester))]
pub async fn list_reservations(
    manager: web::Data<Manager>,
    requester: Requester,
    params: web::Query<ListParams>,
) -> Result<HttpResponse, AppError> {
    let limit = params.limit.clamp(1, 200);
    let offset = params.offset.max(0);

    let reservations = manager
        .list_for_requester(requester.id, limit, offset)
        .await?;

    let response: Vec<ReservationResponse> =
        reservations.into_iter().map(Into::into).collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

/// Fetch one reservation by booking reference
///
/// GET /api/v1/reservations/{ref}
#[instrument(skip(manager, requester))]
pub async fn get_reservation(
    manager: web::Data<Manager>,
    requester: Requester,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let booking_ref = path.into_inner();
    let reservation = manager.get_by_ref(&booking_ref).await?;

    // A requester only sees their own reservations; leaking another
    // requester's booking existence is as bad as leaking its contents
    if reservation.requester_id != requester.id {
        return Err(AppError::ReservationNotFound(booking_ref));
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success(ReservationResponse::from(reservation))))
}

/// Cancel a reservation
///
/// POST /api/v1/reservations/{ref}/cancel
#[instrument(skip(manager, requester))]
pub async fn cancel_reservation(
    manager: web::Data<Manager>,
    requester: Requester,
    path: web::Path<String>,
    req: web::Json<CancelReservationRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(AppError::from)?;

    let booking_ref = path.into_inner();
    let reservation = manager.get_by_ref(&booking_ref).await?;

    // Owners cancel within the cutoff window; anyone else is treated as an
    // operator by the role layer in front of this engine
    let enforce_cutoff = reservation.requester_id == requester.id;

    let cancelled = manager
        .cancel_reservation(&booking_ref, req.reason.as_deref(), enforce_cutoff)
        .await?;

    info!("Reservation {} cancelled", booking_ref);

    Ok(HttpResponse::Ok().json(ApiResponse::success(ReservationResponse::from(cancelled))))
}

/// Mark a confirmed stay as completed
///
/// POST /api/v1/reservations/{ref}/complete
#[instrument(skip(manager))]
pub async fn complete_reservation(
    manager: web::Data<Manager>,
    _requester: Requester,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let booking_ref = path.into_inner();
    let completed = manager.complete_reservation(&booking_ref).await?;

    debug!("Reservation {} completed", booking_ref);

    Ok(HttpResponse::Ok().json(ApiResponse::success(ReservationResponse::from(completed))))
}

/// Open a dispute on a confirmed stay
///
/// POST /api/v1/reservations/{ref}/dispute
#[instrument(skip(manager))]
pub async fn dispute_reservation(
    manager: web::Data<Manager>,
    _requester: Requester,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let booking_ref = path.into_inner();
    let disputed = manager.dispute_reservation(&booking_ref).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(ReservationResponse::from(disputed))))
}

/// Close a dispute
///
/// POST /api/v1/reservations/{ref}/resolve
#[instrument(skip(manager))]
pub async fn resolve_dispute(
    manager: web::Data<Manager>,
    _requester: Requester,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let booking_ref = path.into_inner();
    let resolved = manager.resolve_dispute(&booking_ref).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(ReservationResponse::from(resolved))))
}

/// Configure reservation routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/reservations")
            .route("/quote", web::post().to(quote))
            .route("/availability", web::post().to(check_availability))
            .route("", web::post().to(create_reservation))
            .route("", web::get().to(list_reservations))
            .route("/{ref}", web::get().to(get_reservation))
            .route("/{ref}/cancel", web::post().to(cancel_reservation))
            .route("/{ref}/complete", web::post().to(complete_reservation))
            .route("/{ref}/dispute", web::post().to(dispute_reservation))
            .route("/{ref}/resolve", web::post().to(resolve_dispute)),
    );
}
