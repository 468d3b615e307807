//! Price breakdown values

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fee inputs for a stay, read from the unit's listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Flat cleaning fee per stay
    pub cleaning_fee: Decimal,

    /// Refundable security deposit per stay
    pub security_deposit: Decimal,

    /// Service fee rate applied to the subtotal (0.12 = 12%)
    pub service_fee_rate: Decimal,
}

/// Authoritative price breakdown for a stay
///
/// Recomputed server-side from the same inputs the client displayed, so a
/// tampered client total never reaches the books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Number of nights (half-open date range)
    pub nights: i64,

    /// Nightly rate times nights
    pub subtotal: Decimal,

    /// Service fee, rounded to whole currency units
    pub service_fee: Decimal,

    /// Flat cleaning fee
    pub cleaning_fee: Decimal,

    /// Refundable security deposit
    pub security_deposit: Decimal,

    /// Sum of all components
    pub total: Decimal,
}

impl Quote {
    /// Verify the internal consistency of the breakdown
    pub fn is_consistent(&self) -> bool {
        self.total == self.subtotal + self.service_fee + self.cleaning_fee + self.security_deposit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_consistency() {
        let quote = Quote {
            nights: 3,
            subtotal: dec!(300),
            service_fee: dec!(36),
            cleaning_fee: dec!(20),
            security_deposit: dec!(50),
            total: dec!(406),
        };
        assert!(quote.is_consistent());

        let broken = Quote {
            total: dec!(400),
            ..quote
        };
        assert!(!broken.is_consistent());
    }
}
