//! Product master tests
//!
//! Tests for thresholds and item codes including:
//! - Alert status rules
//! - Min/max validation
//! - Item code format

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::models::{
    compute_alert_status, format_item_code, threshold_display_name, validate_threshold,
    AlertStatus, ThresholdError,
};
use shared::validate_item_code;

fn d(n: i64) -> Decimal {
    Decimal::from(n)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_alert_status_examples() {
        assert_eq!(compute_alert_status(d(5), d(20), d(2)), AlertStatus::Under);
        assert_eq!(compute_alert_status(d(5), d(20), d(25)), AlertStatus::Over);
        assert_eq!(compute_alert_status(d(5), d(20), d(5)), AlertStatus::Ok);
        assert_eq!(compute_alert_status(d(5), d(20), d(20)), AlertStatus::Ok);
    }

    #[test]
    fn test_zero_bounds_are_unset() {
        assert_eq!(compute_alert_status(d(0), d(0), d(1000)), AlertStatus::Ok);
        assert_eq!(compute_alert_status(d(0), d(10), d(0)), AlertStatus::Ok);
        assert_eq!(compute_alert_status(d(3), d(0), d(1000)), AlertStatus::Ok);
    }

    #[test]
    fn test_threshold_validation_messages() {
        assert_eq!(
            validate_threshold(d(-1), d(5)).unwrap_err().to_string(),
            "Min and Max must be >= 0"
        );
        assert_eq!(
            validate_threshold(d(10), d(5)),
            Err(ThresholdError::MinAboveMax)
        );
        // Max unset: any min is fine
        assert!(validate_threshold(d(10), d(0)).is_ok());
    }

    #[test]
    fn test_item_code_sequence_format() {
        assert_eq!(format_item_code(1), "ITM-000001");
        assert_eq!(format_item_code(42), "ITM-000042");
        assert!(validate_item_code(&format_item_code(999_999)).is_ok());
    }

    #[test]
    fn test_display_name() {
        assert_eq!(threshold_display_name("Inverter 5kW", "Main"), "Inverter 5kW / Main");
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn qty_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=100000i64).prop_map(|n| Decimal::new(n, 2)) // 0.00 to 1000.00
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A valid pair never reports both under and over; a level between the bounds is ok
        #[test]
        fn prop_level_between_bounds_is_ok(a in qty_strategy(), b in qty_strategy(), t in 0u32..=100) {
            let (min, max) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(validate_threshold(min, max).is_ok());

            let current = min + (max - min) * Decimal::from(t) / Decimal::from(100);
            prop_assert_eq!(compute_alert_status(min, max, current), AlertStatus::Ok);
        }

        /// Below a set minimum is always under
        #[test]
        fn prop_below_min_is_under(min in 1i64..1000, gap in 1i64..1000, max in 0i64..5000) {
            let current = Decimal::from(min) - Decimal::new(gap, 3);
            prop_assert_eq!(
                compute_alert_status(Decimal::from(min), Decimal::from(max), current),
                AlertStatus::Under
            );
        }

        /// Negative bounds are always rejected
        #[test]
        fn prop_negative_rejected(n in 1i64..10000, other in qty_strategy()) {
            let negative = -Decimal::new(n, 2);
            prop_assert_eq!(validate_threshold(negative, other), Err(ThresholdError::Negative));
            prop_assert_eq!(validate_threshold(other, negative), Err(ThresholdError::Negative));
        }
    }
}
