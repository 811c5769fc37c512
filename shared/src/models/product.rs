//! Product master data: brands, products, warehouses and min/max thresholds

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
    pub id: i64,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    /// Unique item code (e.g., "ITM-000042")
    pub item_code: String,
    pub name: String,
    pub brand_id: Option<i64>,
    pub default_supplier: Option<String>,
    /// Mint one QR label per unit when this product is purchased
    pub qr_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warehouse {
    pub id: i64,
    pub code: String,
    pub name: String,
}

/// Min/max stock levels for a product in one warehouse
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Threshold {
    pub id: i64,
    pub product_id: i64,
    pub warehouse_id: i64,
    pub min_qty: Decimal,
    pub max_qty: Decimal,
}

/// Stock level relative to the configured thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Ok,
    Under,
    Over,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Ok => "ok",
            AlertStatus::Under => "under",
            AlertStatus::Over => "over",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(AlertStatus::Ok),
            "under" => Some(AlertStatus::Under),
            "over" => Some(AlertStatus::Over),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThresholdError {
    #[error("Min and Max must be >= 0")]
    Negative,

    #[error("Min qty cannot be greater than Max qty")]
    MinAboveMax,
}

impl Threshold {
    /// Zero means "not set" for either bound.
    pub fn alert_status(&self, current_qty: Decimal) -> AlertStatus {
        compute_alert_status(self.min_qty, self.max_qty, current_qty)
    }
}

pub fn compute_alert_status(min_qty: Decimal, max_qty: Decimal, current_qty: Decimal) -> AlertStatus {
    if min_qty > Decimal::ZERO && current_qty < min_qty {
        AlertStatus::Under
    } else if max_qty > Decimal::ZERO && current_qty > max_qty {
        AlertStatus::Over
    } else {
        AlertStatus::Ok
    }
}

/// Check a min/max pair. The ordering rule only applies when both bounds are set.
pub fn validate_threshold(min_qty: Decimal, max_qty: Decimal) -> Result<(), ThresholdError> {
    if min_qty < Decimal::ZERO || max_qty < Decimal::ZERO {
        return Err(ThresholdError::Negative);
    }
    if min_qty > Decimal::ZERO && max_qty > Decimal::ZERO && min_qty > max_qty {
        return Err(ThresholdError::MinAboveMax);
    }
    Ok(())
}

/// Format an item code from a sequence value
pub fn format_item_code(sequence: i64) -> String {
    format!("ITM-{:06}", sequence)
}

pub fn threshold_display_name(product_name: &str, warehouse_name: &str) -> String {
    format!("{} / {}", product_name, warehouse_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn test_alert_status() {
        assert_eq!(compute_alert_status(d(5), d(20), d(3)), AlertStatus::Under);
        assert_eq!(compute_alert_status(d(5), d(20), d(21)), AlertStatus::Over);
        assert_eq!(compute_alert_status(d(5), d(20), d(5)), AlertStatus::Ok);
        assert_eq!(compute_alert_status(d(5), d(20), d(20)), AlertStatus::Ok);
    }

    #[test]
    fn test_unset_bounds_never_alert() {
        assert_eq!(compute_alert_status(d(0), d(0), d(1000)), AlertStatus::Ok);
        assert_eq!(compute_alert_status(d(0), d(10), d(0)), AlertStatus::Ok);
    }

    #[test]
    fn test_validate_threshold() {
        assert!(validate_threshold(d(5), d(20)).is_ok());
        assert!(validate_threshold(d(5), d(0)).is_ok());
        assert_eq!(validate_threshold(d(-1), d(20)), Err(ThresholdError::Negative));
        assert_eq!(validate_threshold(d(30), d(20)), Err(ThresholdError::MinAboveMax));
    }

    #[test]
    fn test_item_code_format() {
        assert_eq!(format_item_code(1), "ITM-000001");
        assert_eq!(format_item_code(1234567), "ITM-1234567");
    }
}
