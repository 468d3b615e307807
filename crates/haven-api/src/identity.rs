//! Requester identity extractor
//!
//! The engine trusts the upstream session layer: it terminates
//! authentication and forwards the requester's identity in headers. The
//! extractor only reads them — there is no credential handling here.

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use haven_core::AppError;
use std::future::{ready, Ready};
use uuid::Uuid;

/// Header carrying the authenticated requester's id
pub const REQUESTER_ID_HEADER: &str = "X-Requester-Id";

/// Header carrying the requester's verification state
pub const REQUESTER_VERIFIED_HEADER: &str = "X-Requester-Verified";

/// The authenticated requester behind a request
#[derive(Debug, Clone, Copy)]
pub struct Requester {
    pub id: Uuid,
    pub verified: bool,
}

impl Requester {
    fn extract(req: &HttpRequest) -> Result<Self, AppError> {
        let id = req
            .headers()
            .get(REQUESTER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing requester identity".to_string()))?;

        let id = Uuid::parse_str(id)
            .map_err(|_| AppError::Unauthorized("malformed requester identity".to_string()))?;

        let verified = req
            .headers()
            .get(REQUESTER_VERIFIED_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self { id, verified })
    }
}

impl FromRequest for Requester {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Self::extract(req))
    }
}
