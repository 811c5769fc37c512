//! Purchase order models and label issuance planning

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A purchase order from a supplier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    pub id: i64,
    /// Unique order reference (e.g., "PO0001")
    pub name: String,
    pub supplier_name: String,
    pub warehouse_id: i64,
    pub state: OrderState,
    pub labels_generated: bool,
    pub ordered_at: DateTime<Utc>,
    pub lines: Vec<OrderLine>,
}

/// A single product line on a purchase order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub id: i64,
    pub product_id: i64,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Draft,
    Confirmed,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Draft => "draft",
            OrderState::Confirmed => "confirmed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(OrderState::Draft),
            "confirmed" => Some(OrderState::Confirmed),
            _ => None,
        }
    }
}

/// An order line joined with the product fields label issuance needs
#[derive(Debug, Clone)]
pub struct IssuableLine {
    pub product_id: i64,
    pub item_code: Option<String>,
    pub qr_enabled: bool,
    pub quantity: Decimal,
}

/// How many labels to mint for one product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRequest {
    pub product_id: i64,
    /// Product part of the token: item code, or the product id when there is none
    pub product_code: String,
    pub units: u32,
}

/// Number of whole units in a quantity. Fractions are dropped; non-positive is zero.
pub fn whole_units(quantity: Decimal) -> u32 {
    if quantity <= Decimal::ZERO {
        return 0;
    }
    quantity.floor().to_u32().unwrap_or(u32::MAX)
}

/// Work out the labels an order needs: one per whole unit of every QR-enabled line.
pub fn plan_label_issue(lines: &[IssuableLine]) -> Vec<LabelRequest> {
    lines
        .iter()
        .filter(|line| line.qr_enabled)
        .map(|line| LabelRequest {
            product_id: line.product_id,
            product_code: line
                .item_code
                .clone()
                .filter(|code| !code.trim().is_empty())
                .unwrap_or_else(|| line.product_id.to_string()),
            units: whole_units(line.quantity),
        })
        .filter(|request| request.units > 0)
        .collect()
}

/// Expected quantity per product for the receipt opened when an order is confirmed.
///
/// QR-enabled lines expect exactly the units that get a label, so the last scan
/// completes them. Other lines expect the ordered quantity and are received by hand.
pub fn plan_receipt_lines(lines: &[IssuableLine]) -> Vec<(i64, Decimal)> {
    lines
        .iter()
        .filter_map(|line| {
            let expected = if line.qr_enabled {
                Decimal::from(whole_units(line.quantity))
            } else {
                line.quantity
            };
            (expected > Decimal::ZERO).then_some((line.product_id, expected))
        })
        .collect()
}

/// What label issuance does for an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueDecision {
    Mint,
    AlreadyGenerated,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Labels can only be generated for confirmed orders")]
pub struct OrderNotConfirmed;

/// Labels are minted once per confirmed order; later calls mint nothing.
pub fn issue_decision(
    state: OrderState,
    labels_generated: bool,
) -> Result<IssueDecision, OrderNotConfirmed> {
    match (state, labels_generated) {
        (OrderState::Draft, _) => Err(OrderNotConfirmed),
        (OrderState::Confirmed, true) => Ok(IssueDecision::AlreadyGenerated),
        (OrderState::Confirmed, false) => Ok(IssueDecision::Mint),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn line(product_id: i64, code: Option<&str>, qr: bool, qty: &str) -> IssuableLine {
        IssuableLine {
            product_id,
            item_code: code.map(str::to_string),
            qr_enabled: qr,
            quantity: Decimal::from_str(qty).unwrap(),
        }
    }

    #[test]
    fn test_whole_units_floors() {
        assert_eq!(whole_units(Decimal::from_str("3").unwrap()), 3);
        assert_eq!(whole_units(Decimal::from_str("2.9").unwrap()), 2);
        assert_eq!(whole_units(Decimal::from_str("0.5").unwrap()), 0);
        assert_eq!(whole_units(Decimal::from_str("-4").unwrap()), 0);
    }

    #[test]
    fn test_plan_skips_lines_without_qr() {
        let plan = plan_label_issue(&[
            line(1, Some("ITM-000001"), true, "3"),
            line(2, Some("ITM-000002"), false, "10"),
        ]);
        assert_eq!(
            plan,
            vec![LabelRequest {
                product_id: 1,
                product_code: "ITM-000001".to_string(),
                units: 3,
            }]
        );
    }

    #[test]
    fn test_plan_falls_back_to_product_id() {
        let plan = plan_label_issue(&[line(42, None, true, "1"), line(43, Some(" "), true, "2")]);
        assert_eq!(plan[0].product_code, "42");
        assert_eq!(plan[1].product_code, "43");
    }

    #[test]
    fn test_plan_drops_fractional_only_lines() {
        let plan = plan_label_issue(&[line(7, Some("X"), true, "0.75")]);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_receipt_expects_labelled_units_for_qr_lines() {
        let receipt = plan_receipt_lines(&[
            line(1, Some("ITM-000001"), true, "2.5"),
            line(2, Some("ITM-000002"), false, "4.25"),
            line(3, Some("ITM-000003"), true, "0.5"),
        ]);
        assert_eq!(
            receipt,
            vec![
                (1, Decimal::from(2)),
                (2, Decimal::from_str("4.25").unwrap()),
            ]
        );
    }

    #[test]
    fn test_issue_decision() {
        assert_eq!(issue_decision(OrderState::Draft, false), Err(OrderNotConfirmed));
        assert_eq!(
            issue_decision(OrderState::Confirmed, false),
            Ok(IssueDecision::Mint)
        );
        assert_eq!(
            issue_decision(OrderState::Confirmed, true),
            Ok(IssueDecision::AlreadyGenerated)
        );
    }
}
