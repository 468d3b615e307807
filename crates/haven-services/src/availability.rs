//! Availability checker
//!
//! Decides whether a candidate date range conflicts with the existing
//! calendar of a unit. Two ranges `[s1, e1)` and `[s2, e2)` conflict iff
//! `s1 < e2 && s2 < e1`, so a checkout and a check-in may share a day.
//!
//! Only stays that currently block the calendar are considered: unexpired
//! provisional holds, confirmed stays, and completed stays. Stale
//! provisional holds are swept before the check runs, closing the window
//! where an abandoned checkout keeps dates hostage.

use haven_core::{
    traits::{ReservationRepository, UnitDirectory},
    AppError, AppResult,
};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// The blocking stay's range, surfaced so the UI can suggest alternatives.
/// The requester behind it is deliberately not exposed.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BlockingStay {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Result of an availability check
#[derive(Debug, Clone, Serialize)]
pub struct Availability {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<BlockingStay>,
}

/// Availability checker over the reservation calendar
pub struct AvailabilityChecker<U: UnitDirectory, R: ReservationRepository> {
    unit_dir: Arc<U>,
    reservation_repo: Arc<R>,
}

impl<U: UnitDirectory, R: ReservationRepository> AvailabilityChecker<U, R> {
    /// Create a new availability checker
    pub fn new(unit_dir: Arc<U>, reservation_repo: Arc<R>) -> Self {
        Self {
            unit_dir,
            reservation_repo,
        }
    }

    /// Validate a candidate range: half-open, non-empty, not in the past
    pub fn validate_range(start_date: NaiveDate, end_date: NaiveDate) -> AppResult<()> {
        if start_date >= end_date {
            return Err(AppError::InvalidRange(format!(
                "start date {} must be before end date {}",
                start_date, end_date
            )));
        }

        let today = Utc::now().date_naive();
        if start_date < today {
            return Err(AppError::InvalidRange(format!(
                "start date {} is in the past",
                start_date
            )));
        }

        Ok(())
    }

    /// Check whether `[start_date, end_date)` is free on the unit
    ///
    /// This is the advisory check; the create path re-runs the same query
    /// inside its transaction as the authoritative one.
    #[instrument(skip(self))]
    pub async fn check(
        &self,
        unit_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> AppResult<Availability> {
        Self::validate_range(start_date, end_date)?;

        let unit = self
            .unit_dir
            .find_by_id(unit_id)
            .await?
            .ok_or_else(|| AppError::UnitNotFound(unit_id.to_string()))?;

        // Delisted units take no new reservations
        if !unit.active {
            return Err(AppError::UnitNotFound(unit_id.to_string()));
        }

        // Lazy TTL sweep: reclaim abandoned checkouts before answering
        if let Err(e) = self.reservation_repo.expire_stale().await {
            warn!("Stale-hold sweep failed, continuing: {}", e);
        }

        let conflict = self
            .reservation_repo
            .find_blocking_conflict(unit_id, start_date, end_date)
            .await?;

        match conflict {
            Some(blocking) => {
                debug!(
                    "Unit {} blocked in [{}, {}) by stay [{}, {})",
                    unit_id, start_date, end_date, blocking.start_date, blocking.end_date
                );
                Ok(Availability {
                    available: false,
                    conflict: Some(BlockingStay {
                        start_date: blocking.start_date,
                        end_date: blocking.end_date,
                    }),
                })
            }
            None => Ok(Availability {
                available: true,
                conflict: None,
            }),
        }
    }
}
