//! Stay price calculator
//!
//! Pure computation: date range + nightly rate + fee schedule in, price
//! breakdown out. The same function serves the advisory quote endpoint and
//! the authoritative recompute on the create path, so a tampered client
//! total can never reach the books.

use haven_core::{
    models::{FeeSchedule, Quote},
    AppError, AppResult,
};
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

/// Compute the price breakdown for a stay over `[start_date, end_date)`
///
/// The service fee is rounded half-up to whole currency units; every other
/// component passes through as given.
///
/// # Errors
///
/// - `InvalidRange` when the range covers no nights
/// - `InvalidInput` when the nightly rate is not positive
pub fn quote_stay(
    nightly_rate: Decimal,
    fees: &FeeSchedule,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> AppResult<Quote> {
    let nights = (end_date - start_date).num_days();
    if nights <= 0 {
        return Err(AppError::InvalidRange(format!(
            "stay from {} to {} covers no nights",
            start_date, end_date
        )));
    }

    if nightly_rate <= Decimal::ZERO {
        return Err(AppError::InvalidInput(format!(
            "nightly rate must be positive, got {}",
            nightly_rate
        )));
    }

    let subtotal = nightly_rate * Decimal::from(nights);
    let service_fee = (subtotal * fees.service_fee_rate)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let total = subtotal + service_fee + fees.cleaning_fee + fees.security_deposit;

    Ok(Quote {
        nights,
        subtotal,
        service_fee,
        cleaning_fee: fees.cleaning_fee,
        security_deposit: fees.security_deposit,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn standard_fees() -> FeeSchedule {
        FeeSchedule {
            cleaning_fee: dec!(20),
            security_deposit: dec!(50),
            service_fee_rate: dec!(0.12),
        }
    }

    #[test]
    fn test_three_night_stay() {
        // $100/night, 2024-03-01 -> 2024-03-04: 3 nights
        let quote = quote_stay(
            dec!(100),
            &standard_fees(),
            date(2024, 3, 1),
            date(2024, 3, 4),
        )
        .unwrap();

        assert_eq!(quote.nights, 3);
        assert_eq!(quote.subtotal, dec!(300));
        assert_eq!(quote.service_fee, dec!(36));
        assert_eq!(quote.cleaning_fee, dec!(20));
        assert_eq!(quote.security_deposit, dec!(50));
        assert_eq!(quote.total, dec!(406));
        assert!(quote.is_consistent());
    }

    #[test]
    fn test_service_fee_rounds_half_up() {
        // 2 nights at $218.75 = $437.50 subtotal; 12% = $52.50 exactly on
        // the midpoint, which rounds up to $53
        let quote = quote_stay(
            dec!(218.75),
            &standard_fees(),
            date(2024, 3, 1),
            date(2024, 3, 3),
        )
        .unwrap();

        assert_eq!(quote.subtotal, dec!(437.50));
        assert_eq!(quote.service_fee, dec!(53));
        assert!(quote.is_consistent());
    }

    #[test]
    fn test_service_fee_rounds_down_below_midpoint() {
        // 1 night at $103: 12% = $12.36 -> $12
        let quote = quote_stay(
            dec!(103),
            &standard_fees(),
            date(2024, 3, 1),
            date(2024, 3, 2),
        )
        .unwrap();

        assert_eq!(quote.service_fee, dec!(12));
        assert_eq!(quote.total, dec!(103) + dec!(12) + dec!(20) + dec!(50));
    }

    #[test]
    fn test_other_components_not_rounded() {
        let fees = FeeSchedule {
            cleaning_fee: dec!(19.99),
            security_deposit: dec!(50.50),
            service_fee_rate: dec!(0.12),
        };
        let quote = quote_stay(dec!(100), &fees, date(2024, 3, 1), date(2024, 3, 2)).unwrap();

        assert_eq!(quote.cleaning_fee, dec!(19.99));
        assert_eq!(quote.security_deposit, dec!(50.50));
        assert!(quote.is_consistent());
    }

    #[test]
    fn test_empty_range_rejected() {
        let err = quote_stay(
            dec!(100),
            &standard_fees(),
            date(2024, 3, 4),
            date(2024, 3, 4),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidRange(_)));

        let err = quote_stay(
            dec!(100),
            &standard_fees(),
            date(2024, 3, 4),
            date(2024, 3, 1),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidRange(_)));
    }

    #[test]
    fn test_non_positive_rate_rejected() {
        let err = quote_stay(
            dec!(0),
            &standard_fees(),
            date(2024, 3, 1),
            date(2024, 3, 4),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_deterministic() {
        let a = quote_stay(
            dec!(129.99),
            &standard_fees(),
            date(2024, 7, 10),
            date(2024, 7, 17),
        )
        .unwrap();
        let b = quote_stay(
            dec!(129.99),
            &standard_fees(),
            date(2024, 7, 10),
            date(2024, 7, 17),
        )
        .unwrap();
        assert_eq!(a, b);
    }
}
