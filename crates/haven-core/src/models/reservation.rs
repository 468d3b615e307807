//! Reservation model and lifecycle states
//!
//! A reservation is a hold on a unit's calendar for a half-open date range
//! `[start_date, end_date)`. It is created provisionally, finalized by a
//! payment outcome, and never deleted — terminal states are kept for audit.

use crate::models::Quote;
use chrono::{DateTime, NaiveDate, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Reservation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Created, awaiting payment; holds the dates until its TTL elapses
    #[default]
    Provisional,
    /// Payment confirmed; the stay is booked
    Confirmed,
    /// The stay has taken place
    Completed,
    /// Released, either explicitly or by the TTL sweep
    Cancelled,
    /// A confirmed stay under dispute
    Disputed,
    /// Dispute closed; treated as a completed stay for audit purposes
    Resolved,
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationStatus::Provisional => write!(f, "provisional"),
            ReservationStatus::Confirmed => write!(f, "confirmed"),
            ReservationStatus::Completed => write!(f, "completed"),
            ReservationStatus::Cancelled => write!(f, "cancelled"),
            ReservationStatus::Disputed => write!(f, "disputed"),
            ReservationStatus::Resolved => write!(f, "resolved"),
        }
    }
}

impl ReservationStatus {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "provisional" => Some(ReservationStatus::Provisional),
            "confirmed" => Some(ReservationStatus::Confirmed),
            "completed" => Some(ReservationStatus::Completed),
            "cancelled" => Some(ReservationStatus::Cancelled),
            "disputed" => Some(ReservationStatus::Disputed),
            "resolved" => Some(ReservationStatus::Resolved),
            _ => None,
        }
    }

    /// Statuses that hold the unit's calendar. A provisional hold only
    /// blocks while unexpired; that check needs the row's `expires_at`
    /// and lives on [`Reservation::blocks_availability`].
    pub fn can_block(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Provisional
                | ReservationStatus::Confirmed
                | ReservationStatus::Completed
        )
    }

    /// Check if no further automatic transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Completed
                | ReservationStatus::Cancelled
                | ReservationStatus::Resolved
        )
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Provisional, Confirmed)
                | (Provisional, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
                | (Confirmed, Disputed)
                | (Disputed, Resolved)
        )
    }
}

/// Reservation entity
///
/// Lifecycle:
/// 1. Created provisional at checkout (holds the dates for the TTL)
/// 2. Confirmed once the payment gateway reports success
/// 3. Completed after the stay, or cancelled/disputed along the way
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique identifier (UUID)
    pub id: Uuid,

    /// Human-facing booking reference, unique, never reused
    pub booking_ref: String,

    /// Unit being reserved
    pub unit_id: Uuid,

    /// Requester who placed the reservation
    pub requester_id: Uuid,

    /// First occupied night (inclusive)
    pub start_date: NaiveDate,

    /// Checkout day (exclusive) — back-to-back stays may share this date
    pub end_date: NaiveDate,

    /// Number of guests
    pub guests: i32,

    /// Current status
    pub status: ReservationStatus,

    /// Nightly rate times nights
    pub subtotal: Decimal,

    /// Flat cleaning fee
    pub cleaning_fee: Decimal,

    /// Service fee, rounded to whole currency units
    pub service_fee: Decimal,

    /// Refundable security deposit
    pub security_deposit: Decimal,

    /// Sum of all components
    pub total: Decimal,

    /// When a provisional hold stops blocking the calendar
    pub expires_at: DateTime<Utc>,

    /// When the reservation was cancelled
    pub cancelled_at: Option<DateTime<Utc>>,

    /// Why the reservation was cancelled
    pub cancellation_reason: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Create a new provisional reservation
    pub fn new(
        unit_id: Uuid,
        requester_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        guests: i32,
        quote: &Quote,
        ttl_minutes: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_ref: Self::generate_ref(),
            unit_id,
            requester_id,
            start_date,
            end_date,
            guests,
            status: ReservationStatus::Provisional,
            subtotal: quote.subtotal,
            cleaning_fee: quote.cleaning_fee,
            service_fee: quote.service_fee,
            security_deposit: quote.security_deposit,
            total: quote.total,
            expires_at: now + chrono::Duration::minutes(ttl_minutes),
            cancelled_at: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Generate a fresh booking reference: `BK-<base36 millis>-<5 chars>`
    ///
    /// The timestamp component keeps references roughly sortable; the
    /// random suffix guards against two requests landing on the same
    /// millisecond.
    pub fn generate_ref() -> String {
        let millis = Utc::now().timestamp_millis();
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(5)
            .map(|c| (c as char).to_ascii_uppercase())
            .collect();
        format!("BK-{}-{}", to_base36(millis), suffix)
    }

    /// Number of nights covered by the stay
    #[inline]
    pub fn nights(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    /// Check if a provisional hold has outlived its TTL
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Provisional && now > self.expires_at
    }

    /// Whether this reservation blocks the unit's calendar right now
    pub fn blocks_availability(&self, now: DateTime<Utc>) -> bool {
        self.status.can_block() && !self.is_expired(now)
    }

    /// Half-open interval overlap with a candidate range
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date < end && start < self.end_date
    }
}

/// Lowercase base36 rendering of a non-negative integer
fn to_base36(mut n: i64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n <= 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_quote() -> Quote {
        Quote {
            nights: 3,
            subtotal: dec!(300),
            service_fee: dec!(36),
            cleaning_fee: dec!(20),
            security_deposit: dec!(50),
            total: dec!(406),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_status_blocking() {
        assert!(ReservationStatus::Provisional.can_block());
        assert!(ReservationStatus::Confirmed.can_block());
        assert!(ReservationStatus::Completed.can_block());
        assert!(!ReservationStatus::Cancelled.can_block());
        assert!(!ReservationStatus::Disputed.can_block());
        assert!(!ReservationStatus::Resolved.can_block());
    }

    #[test]
    fn test_status_transitions() {
        use ReservationStatus::*;
        assert!(Provisional.can_transition_to(Confirmed));
        assert!(Provisional.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Disputed));
        assert!(Disputed.can_transition_to(Resolved));

        assert!(!Provisional.can_transition_to(Completed));
        assert!(!Provisional.can_transition_to(Disputed));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Resolved.can_transition_to(Disputed));
        assert!(!Disputed.can_transition_to(Cancelled));
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ReservationStatus::Provisional,
            ReservationStatus::Confirmed,
            ReservationStatus::Completed,
            ReservationStatus::Cancelled,
            ReservationStatus::Disputed,
            ReservationStatus::Resolved,
        ] {
            assert_eq!(
                ReservationStatus::from_str(&status.to_string()),
                Some(status)
            );
        }
        assert_eq!(ReservationStatus::from_str("unknown"), None);
    }

    #[test]
    fn test_half_open_overlap() {
        let quote = sample_quote();
        let res = Reservation::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            date(2024, 3, 1),
            date(2024, 3, 4),
            2,
            &quote,
            15,
        );

        // Strict overlap
        assert!(res.overlaps(date(2024, 3, 3), date(2024, 3, 6)));
        assert!(res.overlaps(date(2024, 2, 28), date(2024, 3, 2)));
        assert!(res.overlaps(date(2024, 3, 2), date(2024, 3, 3)));

        // Back-to-back stays share a checkout/check-in day without conflict
        assert!(!res.overlaps(date(2024, 3, 4), date(2024, 3, 7)));
        assert!(!res.overlaps(date(2024, 2, 26), date(2024, 3, 1)));
    }

    #[test]
    fn test_provisional_expiry() {
        let quote = sample_quote();
        let mut res = Reservation::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            date(2024, 3, 1),
            date(2024, 3, 4),
            2,
            &quote,
            15,
        );

        let now = Utc::now();
        assert!(!res.is_expired(now));
        assert!(res.blocks_availability(now));

        res.expires_at = now - chrono::Duration::minutes(1);
        assert!(res.is_expired(now));
        assert!(!res.blocks_availability(now));

        // Expiry only applies to provisional holds
        res.status = ReservationStatus::Confirmed;
        assert!(!res.is_expired(now));
        assert!(res.blocks_availability(now));
    }

    #[test]
    fn test_booking_ref_shape() {
        let a = Reservation::generate_ref();
        let b = Reservation::generate_ref();

        assert!(a.starts_with("BK-"));
        let parts: Vec<&str> = a.splitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].len(), 5);
        assert_ne!(a, b);
    }

    #[test]
    fn test_nights() {
        let quote = sample_quote();
        let res = Reservation::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            date(2024, 3, 1),
            date(2024, 3, 4),
            2,
            &quote,
            15,
        );
        assert_eq!(res.nights(), 3);
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
