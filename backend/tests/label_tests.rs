//! Label tests
//!
//! Tests for label issuance planning and the label lifecycle including:
//! - Token format
//! - One label per whole unit of QR-enabled lines
//! - Forward-only status transitions

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::models::{
    generate_label_token, issue_decision, plan_label_issue, whole_units, IssuableLine,
    IssueDecision, LabelStatus, OrderNotConfirmed, OrderState, TOKEN_SUFFIX_LEN,
};
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn issuable(product_id: i64, code: Option<&str>, qr_enabled: bool, qty: &str) -> IssuableLine {
    IssuableLine {
        product_id,
        item_code: code.map(str::to_string),
        qr_enabled,
        quantity: dec(qty),
    }
}

const ALL_STATUSES: [LabelStatus; 5] = [
    LabelStatus::Created,
    LabelStatus::Attached,
    LabelStatus::Received,
    LabelStatus::Sold,
    LabelStatus::Returned,
];

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_token_layout() {
        let token = generate_label_token("PO0001", "ITM-000001", "9f2c1a7e5b6d4c3a");
        assert_eq!(token, "PO0001-ITM-000001-9f2c1a7e");
    }

    #[test]
    fn test_plan_for_mixed_order() {
        let lines = vec![
            issuable(1, Some("ITM-000001"), true, "3"),
            issuable(2, Some("ITM-000002"), false, "10"),
            issuable(3, None, true, "2.5"),
            issuable(4, Some("ITM-000004"), true, "0.4"),
        ];

        let plan = plan_label_issue(&lines);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].product_code, "ITM-000001");
        assert_eq!(plan[0].units, 3);
        // No item code: the product id stands in
        assert_eq!(plan[1].product_code, "3");
        assert_eq!(plan[1].units, 2);
    }

    #[test]
    fn test_lifecycle_order() {
        let mut status = LabelStatus::Created;
        let mut visited = vec![status];
        while let Some(next) = status.next() {
            status = status.transition(next).unwrap();
            visited.push(status);
        }
        assert_eq!(visited, ALL_STATUSES.to_vec());
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in ALL_STATUSES {
            assert_eq!(LabelStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(LabelStatus::parse("lost"), None);
    }

    #[test]
    fn test_issue_only_for_confirmed_orders() {
        assert_eq!(issue_decision(OrderState::Draft, false), Err(OrderNotConfirmed));
        assert_eq!(issue_decision(OrderState::Draft, true), Err(OrderNotConfirmed));
        assert_eq!(
            issue_decision(OrderState::Confirmed, false),
            Ok(IssueDecision::Mint)
        );
    }

    #[test]
    fn test_cannot_sell_unreceived_label() {
        let err = LabelStatus::Attached
            .transition(LabelStatus::Sold)
            .unwrap_err();
        assert_eq!(err.to_string(), "label cannot move from attached to sold");
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn quantity_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=50000i64).prop_map(|n| Decimal::new(n, 3)) // 0.000 to 50.000
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Labels minted = floor(quantity) summed over QR-enabled lines
        #[test]
        fn prop_label_count_matches_whole_units(
            lines in prop::collection::vec((quantity_strategy(), any::<bool>()), 0..10)
        ) {
            let issuable: Vec<IssuableLine> = lines
                .iter()
                .enumerate()
                .map(|(i, (qty, qr))| IssuableLine {
                    product_id: i as i64 + 1,
                    item_code: None,
                    qr_enabled: *qr,
                    quantity: *qty,
                })
                .collect();

            let minted: u32 = plan_label_issue(&issuable).iter().map(|r| r.units).sum();
            let expected: u32 = lines
                .iter()
                .filter(|(_, qr)| *qr)
                .map(|(qty, _)| whole_units(*qty))
                .sum();
            prop_assert_eq!(minted, expected);
        }

        /// Tokens keep the order and product parts and an 8-character suffix
        #[test]
        fn prop_token_suffix_length(suffix in "[0-9a-f]{8,32}", order in 1u32..9999) {
            let order_name = format!("PO{:04}", order);
            let token = generate_label_token(&order_name, "ITM-000001", &suffix);
            let prefix = format!("{}-ITM-000001-", order_name);
            prop_assert!(token.starts_with(&prefix));
            prop_assert_eq!(token.len(), prefix.len() + TOKEN_SUFFIX_LEN);
        }

        /// Once labels exist for an order, issuing again mints nothing whatever its lines
        #[test]
        fn prop_reissue_mints_nothing(
            lines in prop::collection::vec((quantity_strategy(), any::<bool>()), 0..10)
        ) {
            let issuable: Vec<IssuableLine> = lines
                .iter()
                .enumerate()
                .map(|(i, (qty, qr))| IssuableLine {
                    product_id: i as i64 + 1,
                    item_code: None,
                    qr_enabled: *qr,
                    quantity: *qty,
                })
                .collect();

            let minted_on_retry: u32 = match issue_decision(OrderState::Confirmed, true) {
                Ok(IssueDecision::Mint) => plan_label_issue(&issuable).iter().map(|r| r.units).sum(),
                _ => 0,
            };
            prop_assert_eq!(minted_on_retry, 0);
        }

        /// Only the single forward step is allowed from any status
        #[test]
        fn prop_only_forward_step_allowed(from in 0usize..5, to in 0usize..5) {
            let (from, to) = (ALL_STATUSES[from], ALL_STATUSES[to]);
            let allowed = from.transition(to).is_ok();
            prop_assert_eq!(allowed, from.next() == Some(to));
        }
    }
}
