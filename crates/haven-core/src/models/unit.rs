//! Bookable unit (listing) model
//!
//! Units are owned by the listing directory; the reservation engine only
//! reads them for capacity and pricing inputs.

use crate::models::FeeSchedule;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bookable unit entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    /// Unique identifier (UUID)
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Maximum number of guests
    pub capacity: i32,

    /// Price per night
    pub nightly_rate: Decimal,

    /// Flat cleaning fee per stay
    pub cleaning_fee: Decimal,

    /// Refundable security deposit per stay
    pub security_deposit: Decimal,

    /// Service fee rate applied to the subtotal (0.12 = 12%)
    pub service_fee_rate: Decimal,

    /// Whether the unit currently accepts reservations
    pub active: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Unit {
    /// Fee inputs for the price calculator
    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule {
            cleaning_fee: self.cleaning_fee,
            security_deposit: self.security_deposit,
            service_fee_rate: self.service_fee_rate,
        }
    }

    /// Check if a guest count fits this unit
    pub fn accommodates(&self, guests: i32) -> bool {
        guests >= 1 && guests <= self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_unit() -> Unit {
        let now = Utc::now();
        Unit {
            id: Uuid::new_v4(),
            name: "Seafront Cottage".to_string(),
            capacity: 4,
            nightly_rate: dec!(100),
            cleaning_fee: dec!(20),
            security_deposit: dec!(50),
            service_fee_rate: dec!(0.12),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_accommodates() {
        let unit = sample_unit();
        assert!(unit.accommodates(1));
        assert!(unit.accommodates(4));
        assert!(!unit.accommodates(0));
        assert!(!unit.accommodates(5));
        assert!(!unit.accommodates(-1));
    }

    #[test]
    fn test_fee_schedule() {
        let unit = sample_unit();
        let fees = unit.fee_schedule();
        assert_eq!(fees.cleaning_fee, dec!(20));
        assert_eq!(fees.security_deposit, dec!(50));
        assert_eq!(fees.service_fee_rate, dec!(0.12));
    }
}
