//! Receipt transfers and the scan reconciliation rules
//!
//! A [`Transfer`] is treated as an aggregate: the backend loads it under a row lock,
//! asks it where a scanned label goes ([`Transfer::plan_scan`]), persists the result and
//! records it back on the aggregate, then asks whether it can be finalized.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::LabelStatus;

/// A logical movement of goods into a warehouse
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: i64,
    /// Unique reference (e.g., "WH/IN/00045")
    pub name: String,
    pub purchase_order_id: Option<i64>,
    pub warehouse_id: i64,
    pub fsm_order_id: Option<i64>,
    pub status: TransferStatus,
    pub done_at: Option<DateTime<Utc>>,
    pub lines: Vec<TransferLine>,
}

/// Expected vs. fulfilled quantity of one product on a transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferLine {
    pub id: i64,
    pub product_id: i64,
    pub expected_qty: Decimal,
    pub fulfilled_qty: Decimal,
    /// Last label attached to this line
    pub label_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl TransferLine {
    pub fn is_satisfied(&self) -> bool {
        self.fulfilled_qty >= self.expected_qty
    }

    /// A line created by a scan for a product the transfer never expected
    pub fn is_unplanned(&self) -> bool {
        self.expected_qty <= Decimal::ZERO
    }

    pub fn remaining(&self) -> Decimal {
        (self.expected_qty - self.fulfilled_qty).max(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Open,
    Done,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Open => "open",
            TransferStatus::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(TransferStatus::Open),
            "done" => Some(TransferStatus::Done),
            _ => None,
        }
    }
}

/// What to do with a label whose product has no unfulfilled line on the transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnexpectedProductPolicy {
    /// Refuse the scan
    #[default]
    Reject,
    /// Open an unplanned line; the transfer then needs manual validation
    Accept,
}

/// The label fields the reconciler looks at
#[derive(Debug, Clone)]
pub struct ScannedLabel {
    pub id: i64,
    pub product_id: i64,
    pub purchase_order_id: Option<i64>,
    pub status: LabelStatus,
}

/// Where a scanned unit goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPlan {
    /// Add one unit to an existing line (index into `Transfer::lines`)
    Increment { line_index: usize, line_id: i64 },
    /// Open a new line holding this single unit
    NewLine { product_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanRejection {
    #[error("transfer {transfer} is already done")]
    TransferClosed { transfer: String },

    #[error("label already scanned (status: {status})")]
    AlreadyScanned { status: LabelStatus },

    #[error("label belongs to a different purchase order than transfer {transfer}")]
    WrongOrder { transfer: String },

    #[error("product {product_id} is not expected on transfer {transfer}")]
    UnexpectedProduct { product_id: i64, transfer: String },

    #[error("product {product_id} is already fully received on transfer {transfer}")]
    FullyReceived { product_id: i64, transfer: String },
}

/// Why a hand-counted quantity cannot be booked on a line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManualReceiptRejection {
    #[error("transfer {transfer} is already done")]
    TransferClosed { transfer: String },

    #[error("line {line_id} is not on transfer {transfer}")]
    UnknownLine { line_id: i64, transfer: String },

    #[error("received quantity must be positive")]
    NotPositive,

    #[error("product {product_id} carries QR labels and is received by scanning")]
    LabelTracked { product_id: i64 },

    #[error("only {remaining} left to receive on line {line_id}")]
    ExceedsRemaining { line_id: i64, remaining: Decimal },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FinalizeBlocker {
    #[error("transfer is not open")]
    NotOpen,

    #[error("transfer has no lines")]
    Empty,

    #[error("product {product_id} still needs {remaining}")]
    Unsatisfied { product_id: i64, remaining: Decimal },

    #[error("product {product_id} was not expected on this transfer")]
    Unplanned { product_id: i64 },

    #[error("product {product_id} received {fulfilled} of {expected}")]
    OverReceived {
        product_id: i64,
        expected: Decimal,
        fulfilled: Decimal,
    },
}

/// All blockers found when finalizing a transfer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_blockers(.0))]
pub struct FinalizeBlocked(pub Vec<FinalizeBlocker>);

fn join_blockers(blockers: &[FinalizeBlocker]) -> String {
    blockers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Pick the line a unit of `product_id` should land on.
///
/// Returns the earliest-created line (ties broken by id) for that product whose
/// fulfilled quantity is still below its expected quantity.
pub fn allocate_line(lines: &[TransferLine], product_id: i64) -> Option<usize> {
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.product_id == product_id && !line.is_satisfied())
        .min_by_key(|(_, line)| (line.created_at, line.id))
        .map(|(index, _)| index)
}

impl Transfer {
    pub fn is_open(&self) -> bool {
        self.status == TransferStatus::Open
    }

    /// Decide where a scanned label goes, or why it is refused.
    ///
    /// The status check runs first so a label is never counted twice.
    pub fn plan_scan(
        &self,
        label: &ScannedLabel,
        policy: UnexpectedProductPolicy,
    ) -> Result<ScanPlan, ScanRejection> {
        if !self.is_open() {
            return Err(ScanRejection::TransferClosed {
                transfer: self.name.clone(),
            });
        }

        if !label.status.is_scannable() {
            return Err(ScanRejection::AlreadyScanned {
                status: label.status,
            });
        }

        if policy == UnexpectedProductPolicy::Reject {
            if let (Some(expected), Some(actual)) = (self.purchase_order_id, label.purchase_order_id)
            {
                if expected != actual {
                    return Err(ScanRejection::WrongOrder {
                        transfer: self.name.clone(),
                    });
                }
            }
        }

        if let Some(line_index) = allocate_line(&self.lines, label.product_id) {
            return Ok(ScanPlan::Increment {
                line_index,
                line_id: self.lines[line_index].id,
            });
        }

        match policy {
            UnexpectedProductPolicy::Accept => Ok(ScanPlan::NewLine {
                product_id: label.product_id,
            }),
            UnexpectedProductPolicy::Reject => {
                let known = self.lines.iter().any(|l| l.product_id == label.product_id);
                if known {
                    Err(ScanRejection::FullyReceived {
                        product_id: label.product_id,
                        transfer: self.name.clone(),
                    })
                } else {
                    Err(ScanRejection::UnexpectedProduct {
                        product_id: label.product_id,
                        transfer: self.name.clone(),
                    })
                }
            }
        }
    }

    /// Record one unit added to an existing line
    pub fn record_increment(&mut self, line_index: usize, label_id: i64) {
        if let Some(line) = self.lines.get_mut(line_index) {
            line.fulfilled_qty += Decimal::ONE;
            line.label_id = Some(label_id);
        }
    }

    /// Check a hand-counted quantity for a line of a product without QR labels.
    ///
    /// Returns the index of the line to book it on.
    pub fn plan_manual_receipt(
        &self,
        line_id: i64,
        quantity: Decimal,
        label_tracked: bool,
    ) -> Result<usize, ManualReceiptRejection> {
        if !self.is_open() {
            return Err(ManualReceiptRejection::TransferClosed {
                transfer: self.name.clone(),
            });
        }

        let line_index = self
            .lines
            .iter()
            .position(|l| l.id == line_id)
            .ok_or_else(|| ManualReceiptRejection::UnknownLine {
                line_id,
                transfer: self.name.clone(),
            })?;
        let line = &self.lines[line_index];

        if label_tracked {
            return Err(ManualReceiptRejection::LabelTracked {
                product_id: line.product_id,
            });
        }
        if quantity <= Decimal::ZERO {
            return Err(ManualReceiptRejection::NotPositive);
        }
        if quantity > line.remaining() {
            return Err(ManualReceiptRejection::ExceedsRemaining {
                line_id,
                remaining: line.remaining(),
            });
        }
        Ok(line_index)
    }

    /// Record a hand-counted quantity
    pub fn record_manual_receipt(&mut self, line_index: usize, quantity: Decimal) {
        if let Some(line) = self.lines.get_mut(line_index) {
            line.fulfilled_qty += quantity;
        }
    }

    /// Record a line opened by a scan
    pub fn record_new_line(&mut self, line: TransferLine) {
        self.lines.push(line);
    }

    /// True when every line's fulfilled quantity meets its expected quantity
    pub fn is_complete(&self) -> bool {
        !self.lines.is_empty() && self.lines.iter().all(TransferLine::is_satisfied)
    }

    /// Everything that prevents this transfer from being finalized
    pub fn finalize_blockers(&self) -> Vec<FinalizeBlocker> {
        let mut blockers = Vec::new();
        if !self.is_open() {
            blockers.push(FinalizeBlocker::NotOpen);
        }
        if self.lines.is_empty() {
            blockers.push(FinalizeBlocker::Empty);
        }
        for line in &self.lines {
            if line.is_unplanned() {
                blockers.push(FinalizeBlocker::Unplanned {
                    product_id: line.product_id,
                });
            } else if !line.is_satisfied() {
                blockers.push(FinalizeBlocker::Unsatisfied {
                    product_id: line.product_id,
                    remaining: line.remaining(),
                });
            } else if line.fulfilled_qty > line.expected_qty {
                blockers.push(FinalizeBlocker::OverReceived {
                    product_id: line.product_id,
                    expected: line.expected_qty,
                    fulfilled: line.fulfilled_qty,
                });
            }
        }
        blockers
    }

    pub fn check_finalize(&self) -> Result<(), FinalizeBlocked> {
        let blockers = self.finalize_blockers();
        if blockers.is_empty() {
            Ok(())
        } else {
            Err(FinalizeBlocked(blockers))
        }
    }

    /// Fulfilled quantity per product, used to post stock on finalize
    pub fn received_quantities(&self) -> BTreeMap<i64, Decimal> {
        let mut totals = BTreeMap::new();
        for line in &self.lines {
            *totals.entry(line.product_id).or_insert(Decimal::ZERO) += line.fulfilled_qty;
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn line(id: i64, product_id: i64, expected: i64, fulfilled: i64, minutes: i64) -> TransferLine {
        TransferLine {
            id,
            product_id,
            expected_qty: Decimal::from(expected),
            fulfilled_qty: Decimal::from(fulfilled),
            label_id: None,
            created_at: at(minutes),
        }
    }

    fn transfer(lines: Vec<TransferLine>) -> Transfer {
        Transfer {
            id: 45,
            name: "WH/IN/00045".to_string(),
            purchase_order_id: Some(1),
            warehouse_id: 1,
            fsm_order_id: None,
            status: TransferStatus::Open,
            done_at: None,
            lines,
        }
    }

    fn label(product_id: i64) -> ScannedLabel {
        ScannedLabel {
            id: 900,
            product_id,
            purchase_order_id: Some(1),
            status: LabelStatus::Created,
        }
    }

    #[test]
    fn test_allocate_prefers_earliest_created() {
        let lines = vec![line(3, 10, 2, 0, 5), line(2, 10, 2, 0, 1), line(1, 11, 2, 0, 0)];
        assert_eq!(allocate_line(&lines, 10), Some(1));
    }

    #[test]
    fn test_allocate_breaks_ties_by_id() {
        let lines = vec![line(8, 10, 1, 0, 0), line(4, 10, 1, 0, 0)];
        assert_eq!(allocate_line(&lines, 10), Some(1));
    }

    #[test]
    fn test_allocate_skips_satisfied_lines() {
        let lines = vec![line(1, 10, 2, 2, 0), line(2, 10, 3, 1, 1)];
        assert_eq!(allocate_line(&lines, 10), Some(1));
        assert_eq!(allocate_line(&lines[..1], 10), None);
    }

    #[test]
    fn test_plan_increments_matching_line() {
        let t = transfer(vec![line(1, 10, 3, 0, 0)]);
        let plan = t.plan_scan(&label(10), UnexpectedProductPolicy::Reject).unwrap();
        assert_eq!(plan, ScanPlan::Increment { line_index: 0, line_id: 1 });
    }

    #[test]
    fn test_plan_rejects_rescanned_label() {
        let t = transfer(vec![line(1, 10, 3, 1, 0)]);
        let mut scanned = label(10);
        scanned.status = LabelStatus::Attached;
        assert_eq!(
            t.plan_scan(&scanned, UnexpectedProductPolicy::Accept),
            Err(ScanRejection::AlreadyScanned {
                status: LabelStatus::Attached
            })
        );
    }

    #[test]
    fn test_plan_rejects_closed_transfer() {
        let mut t = transfer(vec![line(1, 10, 1, 1, 0)]);
        t.status = TransferStatus::Done;
        assert!(matches!(
            t.plan_scan(&label(10), UnexpectedProductPolicy::Accept),
            Err(ScanRejection::TransferClosed { .. })
        ));
    }

    #[test]
    fn test_reject_policy_unknown_and_full_products() {
        let t = transfer(vec![line(1, 10, 1, 1, 0)]);
        assert!(matches!(
            t.plan_scan(&label(10), UnexpectedProductPolicy::Reject),
            Err(ScanRejection::FullyReceived { product_id: 10, .. })
        ));
        assert!(matches!(
            t.plan_scan(&label(99), UnexpectedProductPolicy::Reject),
            Err(ScanRejection::UnexpectedProduct { product_id: 99, .. })
        ));
    }

    #[test]
    fn test_reject_policy_wrong_order() {
        let t = transfer(vec![line(1, 10, 1, 0, 0)]);
        let mut scanned = label(10);
        scanned.purchase_order_id = Some(2);
        assert!(matches!(
            t.plan_scan(&scanned, UnexpectedProductPolicy::Reject),
            Err(ScanRejection::WrongOrder { .. })
        ));
        assert!(t.plan_scan(&scanned, UnexpectedProductPolicy::Accept).is_ok());
    }

    #[test]
    fn test_accept_policy_opens_new_line() {
        let t = transfer(vec![line(1, 10, 1, 1, 0)]);
        assert_eq!(
            t.plan_scan(&label(99), UnexpectedProductPolicy::Accept),
            Ok(ScanPlan::NewLine { product_id: 99 })
        );
    }

    #[test]
    fn test_complete_after_last_unit() {
        let mut t = transfer(vec![line(1, 10, 2, 1, 0)]);
        assert!(!t.is_complete());
        t.record_increment(0, 900);
        assert!(t.is_complete());
        assert_eq!(t.lines[0].label_id, Some(900));
        assert!(t.check_finalize().is_ok());
    }

    #[test]
    fn test_unplanned_line_blocks_finalize() {
        let mut t = transfer(vec![line(1, 10, 1, 1, 0)]);
        t.record_new_line(line(2, 99, 0, 1, 10));
        assert!(t.is_complete());
        let blocked = t.check_finalize().unwrap_err();
        assert_eq!(blocked.0, vec![FinalizeBlocker::Unplanned { product_id: 99 }]);
    }

    #[test]
    fn test_finalize_lists_every_blocker() {
        let mut t = transfer(vec![line(1, 10, 3, 1, 0), line(2, 11, 1, 2, 1)]);
        t.status = TransferStatus::Done;
        let blockers = t.finalize_blockers();
        assert_eq!(blockers.len(), 3);
        assert_eq!(blockers[0], FinalizeBlocker::NotOpen);
    }

    #[test]
    fn test_received_quantities_sum_per_product() {
        let t = transfer(vec![line(1, 10, 2, 2, 0), line(2, 10, 1, 1, 1), line(3, 11, 4, 4, 2)]);
        let totals = t.received_quantities();
        assert_eq!(totals[&10], Decimal::from(3));
        assert_eq!(totals[&11], Decimal::from(4));
    }

    #[test]
    fn test_manual_receipt_books_remaining_quantity() {
        let mut t = transfer(vec![line(1, 10, 5, 2, 0)]);
        let index = t.plan_manual_receipt(1, Decimal::from(3), false).unwrap();
        t.record_manual_receipt(index, Decimal::from(3));
        assert!(t.is_complete());
        assert!(t.check_finalize().is_ok());
    }

    #[test]
    fn test_manual_receipt_rejections() {
        let t = transfer(vec![line(1, 10, 5, 2, 0)]);
        assert_eq!(
            t.plan_manual_receipt(1, Decimal::from(4), false),
            Err(ManualReceiptRejection::ExceedsRemaining {
                line_id: 1,
                remaining: Decimal::from(3),
            })
        );
        assert_eq!(
            t.plan_manual_receipt(1, Decimal::ZERO, false),
            Err(ManualReceiptRejection::NotPositive)
        );
        assert_eq!(
            t.plan_manual_receipt(1, Decimal::ONE, true),
            Err(ManualReceiptRejection::LabelTracked { product_id: 10 })
        );
        assert!(matches!(
            t.plan_manual_receipt(7, Decimal::ONE, false),
            Err(ManualReceiptRejection::UnknownLine { line_id: 7, .. })
        ));
    }
}
