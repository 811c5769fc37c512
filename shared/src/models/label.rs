//! Per-unit QR labels

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of hex characters taken from a random id for the token suffix
pub const TOKEN_SUFFIX_LEN: usize = 8;

/// A uniquely tokenized label identifying one physical unit of a product
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: i64,
    /// Globally unique scan token (e.g., "PO0001-ITM-000004-9f2c1a7e")
    pub token: String,
    pub product_id: i64,
    pub purchase_order_id: Option<i64>,
    pub status: LabelStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_svg: Option<String>,
    pub supplier_name: Option<String>,
    pub purchase_name: Option<String>,
    pub purchase_date: Option<DateTime<Utc>>,
    pub sales_ref: Option<String>,
    pub customer_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle status of a label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelStatus {
    Created,
    Attached,
    Received,
    Sold,
    Returned,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("label cannot move from {from} to {to}")]
pub struct StatusTransitionError {
    pub from: LabelStatus,
    pub to: LabelStatus,
}

impl LabelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelStatus::Created => "created",
            LabelStatus::Attached => "attached",
            LabelStatus::Received => "received",
            LabelStatus::Sold => "sold",
            LabelStatus::Returned => "returned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(LabelStatus::Created),
            "attached" => Some(LabelStatus::Attached),
            "received" => Some(LabelStatus::Received),
            "sold" => Some(LabelStatus::Sold),
            "returned" => Some(LabelStatus::Returned),
            _ => None,
        }
    }

    /// Only freshly minted labels may be scanned into a transfer.
    pub fn is_scannable(&self) -> bool {
        matches!(self, LabelStatus::Created)
    }

    /// The single permitted successor of each status
    pub fn next(&self) -> Option<LabelStatus> {
        match self {
            LabelStatus::Created => Some(LabelStatus::Attached),
            LabelStatus::Attached => Some(LabelStatus::Received),
            LabelStatus::Received => Some(LabelStatus::Sold),
            LabelStatus::Sold => Some(LabelStatus::Returned),
            LabelStatus::Returned => None,
        }
    }

    /// Validate a transition, returning the new status
    pub fn transition(self, to: LabelStatus) -> Result<LabelStatus, StatusTransitionError> {
        if self.next() == Some(to) {
            Ok(to)
        } else {
            Err(StatusTransitionError { from: self, to })
        }
    }
}

impl std::fmt::Display for LabelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a label token from the order name, the product code and a random suffix.
///
/// The suffix is truncated to [`TOKEN_SUFFIX_LEN`] characters.
pub fn generate_label_token(order_name: &str, product_code: &str, random_hex: &str) -> String {
    let suffix: String = random_hex.chars().take(TOKEN_SUFFIX_LEN).collect();
    format!("{}-{}-{}", order_name, product_code, suffix)
}
