//! Scan reconciliation: attach a scanned label to a transfer line and auto-validate
//! the transfer once every line is satisfied.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{
    LabelStatus, ScanPlan, ScanRejection, ScannedLabel, Transfer, TransferLine, TransferStatus,
    UnexpectedProductPolicy,
};
use sqlx::{Connection, PgConnection, PgPool};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::label::parse_label_status;
use crate::services::transfer::{finalize, load_transfer, TransferLineRow, TRANSFER_LINE_COLUMNS};

/// Receiving service
#[derive(Clone)]
pub struct ReceivingService {
    db: PgPool,
    policy: UnexpectedProductPolicy,
}

/// What a successful scan did to the transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    /// Unit counted; transfer still waiting for more
    Scanned,
    /// Last unit counted and the transfer was validated
    Received,
    /// Every line is satisfied but validation failed; a person has to finish it
    ReadyForManualValidation,
}

impl ScanOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            ScanOutcome::Scanned => "Scanned OK",
            ScanOutcome::Received => "Scanned OK, transfer validated",
            ScanOutcome::ReadyForManualValidation => {
                "Scanned OK, transfer ready for manual validation"
            }
        }
    }

    /// Transfer status after the gate ran; only a validated transfer moves to done
    pub fn transfer_status(&self, before: TransferStatus) -> TransferStatus {
        match self {
            ScanOutcome::Received => TransferStatus::Done,
            _ => before,
        }
    }
}

/// Map the completion gate's result to an outcome.
///
/// `None` means the transfer still has unsatisfied lines and finalize was not tried.
pub fn gate_outcome<E>(finalized: Option<&Result<(), E>>) -> ScanOutcome {
    match finalized {
        None => ScanOutcome::Scanned,
        Some(Ok(())) => ScanOutcome::Received,
        Some(Err(_)) => ScanOutcome::ReadyForManualValidation,
    }
}

/// Scan response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub ok: bool,
    pub message: String,
    pub label_id: i64,
    pub outcome: ScanOutcome,
    pub transfer_id: i64,
    pub transfer_status: TransferStatus,
}

/// Hand-counted quantity for a line whose product has no QR labels
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveLineInput {
    pub quantity: Decimal,
}

/// Manual receipt response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveLineResult {
    pub ok: bool,
    pub line_id: i64,
    pub fulfilled_qty: Decimal,
    pub outcome: ScanOutcome,
    pub transfer_id: i64,
    pub transfer_status: TransferStatus,
}

impl ReceivingService {
    /// Create a new ReceivingService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            policy: config.receiving.unexpected_product_policy,
        }
    }

    /// Reconcile one scanned token against a transfer.
    ///
    /// Runs in a single transaction holding the transfer and label rows `FOR UPDATE`;
    /// any rejection rolls back without touching a line.
    pub async fn scan(
        &self,
        token: &str,
        transfer_id: i64,
        scanned_by: Option<i64>,
    ) -> AppResult<ScanResult> {
        shared::validate_scan_token(token).map_err(|m| AppError::validation("token", m))?;
        let token = token.trim();

        let label_id: i64 = sqlx::query_scalar("SELECT id FROM labels WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Label".to_string()))?;

        let mut tx = self.db.begin().await?;

        // Transfer before label, always in that order
        let mut transfer = load_transfer(&mut tx, transfer_id, true).await?;
        let label = lock_scanned_label(&mut tx, label_id).await?;

        let plan = transfer.plan_scan(&label, self.policy)?;
        let line_id = match plan {
            ScanPlan::Increment {
                line_index,
                line_id,
            } => {
                increment_line(&mut tx, line_id, label.id).await?;
                transfer.record_increment(line_index, label.id);
                line_id
            }
            ScanPlan::NewLine { product_id } => {
                let line = insert_unplanned_line(&mut tx, transfer.id, product_id, label.id).await?;
                tracing::warn!(
                    "Product {} not planned on transfer {}; opened line {}",
                    product_id,
                    transfer.name,
                    line.id
                );
                let id = line.id;
                transfer.record_new_line(line);
                id
            }
        };

        attach_label(&mut tx, &label).await?;
        record_scan(&mut tx, &transfer, line_id, label.id, scanned_by).await?;

        let outcome = completion_gate(&mut tx, &transfer).await?;
        tx.commit().await?;
        let transfer_status = outcome.transfer_status(transfer.status);

        tracing::info!(
            "Label {} scanned into {} ({:?})",
            token,
            transfer.name,
            outcome
        );

        Ok(ScanResult {
            ok: true,
            message: outcome.message().to_string(),
            label_id: label.id,
            outcome,
            transfer_id: transfer.id,
            transfer_status,
        })
    }

    /// Book a hand-counted quantity on a line of a product without QR labels, then run
    /// the same completion gate a scan does
    pub async fn receive_line(
        &self,
        transfer_id: i64,
        line_id: i64,
        input: ReceiveLineInput,
    ) -> AppResult<ReceiveLineResult> {
        let mut tx = self.db.begin().await?;
        let mut transfer = load_transfer(&mut tx, transfer_id, true).await?;

        let label_tracked: bool = sqlx::query_scalar(
            r#"
            SELECT p.qr_enabled
            FROM transfer_lines l
            JOIN products p ON p.id = l.product_id
            WHERE l.id = $1 AND l.transfer_id = $2
            "#,
        )
        .bind(line_id)
        .bind(transfer_id)
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or(false);

        let line_index = transfer.plan_manual_receipt(line_id, input.quantity, label_tracked)?;

        let updated = sqlx::query(
            r#"
            UPDATE transfer_lines
            SET fulfilled_qty = fulfilled_qty + $1
            WHERE id = $2 AND fulfilled_qty + $1 <= expected_qty
            "#,
        )
        .bind(input.quantity)
        .bind(line_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(AppError::Conflict {
                resource: "transferLine".to_string(),
                message: "Transfer line was filled concurrently".to_string(),
            });
        }
        transfer.record_manual_receipt(line_index, input.quantity);

        let outcome = completion_gate(&mut tx, &transfer).await?;
        tx.commit().await?;

        tracing::info!(
            "Received {} by hand on line {} of {} ({:?})",
            input.quantity,
            line_id,
            transfer.name,
            outcome
        );

        Ok(ReceiveLineResult {
            ok: true,
            line_id,
            fulfilled_qty: transfer.lines[line_index].fulfilled_qty,
            outcome,
            transfer_id: transfer.id,
            transfer_status: outcome.transfer_status(transfer.status),
        })
    }
}

/// Finalize a satisfied transfer inside a savepoint so a failure keeps the receipt
/// that triggered it
async fn completion_gate(conn: &mut PgConnection, transfer: &Transfer) -> AppResult<ScanOutcome> {
    if !transfer.is_complete() {
        return Ok(gate_outcome::<AppError>(None));
    }

    let mut savepoint = Connection::begin(&mut *conn).await?;
    let finalized = finalize(&mut savepoint, transfer).await;
    match &finalized {
        Ok(()) => savepoint.commit().await?,
        Err(e) => {
            tracing::warn!(
                "Transfer {} left for manual validation: {}",
                transfer.name,
                e
            );
            savepoint.rollback().await?;
        }
    }
    Ok(gate_outcome(Some(&finalized)))
}

async fn lock_scanned_label(conn: &mut PgConnection, label_id: i64) -> AppResult<ScannedLabel> {
    let (id, product_id, purchase_order_id, status) =
        sqlx::query_as::<_, (i64, i64, Option<i64>, String)>(
            "SELECT id, product_id, purchase_order_id, status FROM labels WHERE id = $1 FOR UPDATE",
        )
        .bind(label_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Label".to_string()))?;

    Ok(ScannedLabel {
        id,
        product_id,
        purchase_order_id,
        status: parse_label_status(&status)?,
    })
}

async fn increment_line(conn: &mut PgConnection, line_id: i64, label_id: i64) -> AppResult<()> {
    let updated = sqlx::query(
        r#"
        UPDATE transfer_lines
        SET fulfilled_qty = fulfilled_qty + 1, label_id = $1
        WHERE id = $2 AND fulfilled_qty < expected_qty
        "#,
    )
    .bind(label_id)
    .bind(line_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(AppError::Conflict {
            resource: "transferLine".to_string(),
            message: "Transfer line was filled concurrently".to_string(),
        });
    }
    Ok(())
}

async fn insert_unplanned_line(
    conn: &mut PgConnection,
    transfer_id: i64,
    product_id: i64,
    label_id: i64,
) -> AppResult<TransferLine> {
    let row = sqlx::query_as::<_, TransferLineRow>(&format!(
        r#"
        INSERT INTO transfer_lines (transfer_id, product_id, expected_qty, fulfilled_qty, label_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {}
        "#,
        TRANSFER_LINE_COLUMNS
    ))
    .bind(transfer_id)
    .bind(product_id)
    .bind(Decimal::ZERO)
    .bind(Decimal::ONE)
    .bind(label_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.into())
}

async fn attach_label(conn: &mut PgConnection, label: &ScannedLabel) -> AppResult<()> {
    let next = label.status.transition(LabelStatus::Attached)?;
    let updated = sqlx::query(
        "UPDATE labels SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
    )
    .bind(next.as_str())
    .bind(label.id)
    .bind(LabelStatus::Created.as_str())
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(ScanRejection::AlreadyScanned {
            status: label.status,
        }
        .into());
    }
    Ok(())
}

async fn record_scan(
    conn: &mut PgConnection,
    transfer: &Transfer,
    line_id: i64,
    label_id: i64,
    scanned_by: Option<i64>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transfer_scans (transfer_id, transfer_line_id, label_id, scanned_by)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(transfer.id)
    .bind(line_id)
    .bind(label_id)
    .bind(scanned_by)
    .execute(&mut *conn)
    .await
    .map_err(|e| match AppError::unique_violation(e, "labelId") {
        AppError::DuplicateEntry(_) => AppError::validation("token", "label already scanned"),
        other => other,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_wire_names() {
        assert_eq!(
            serde_json::to_value(ScanOutcome::ReadyForManualValidation).unwrap(),
            "ready_for_manual_validation"
        );
        assert_eq!(serde_json::to_value(ScanOutcome::Received).unwrap(), "received");
    }

    #[test]
    fn test_manual_validation_message() {
        assert_eq!(
            ScanOutcome::ReadyForManualValidation.message(),
            "Scanned OK, transfer ready for manual validation"
        );
    }

    #[test]
    fn test_scan_result_is_camel_case() {
        let body = serde_json::to_value(ScanResult {
            ok: true,
            message: ScanOutcome::Scanned.message().to_string(),
            label_id: 7,
            outcome: ScanOutcome::Scanned,
            transfer_id: 45,
            transfer_status: TransferStatus::Open,
        })
        .unwrap();
        assert_eq!(body["labelId"], 7);
        assert_eq!(body["transferId"], 45);
        assert_eq!(body["transferStatus"], "open");
    }

    #[test]
    fn test_blocked_finalize_keeps_transfer_open() {
        let blocked: Result<(), AppError> = Err(AppError::InvalidStateTransition(
            "Transfer cannot be validated: product 77 was not expected on this transfer"
                .to_string(),
        ));
        let outcome = gate_outcome(Some(&blocked));
        assert_eq!(outcome, ScanOutcome::ReadyForManualValidation);
        assert_eq!(outcome.transfer_status(TransferStatus::Open), TransferStatus::Open);
    }

    #[test]
    fn test_gate_outcomes() {
        assert_eq!(gate_outcome::<AppError>(None), ScanOutcome::Scanned);
        assert_eq!(gate_outcome::<AppError>(Some(&Ok(()))), ScanOutcome::Received);
        assert_eq!(
            ScanOutcome::Received.transfer_status(TransferStatus::Open),
            TransferStatus::Done
        );
        assert_eq!(
            ScanOutcome::Scanned.transfer_status(TransferStatus::Open),
            TransferStatus::Open
        );
    }
}
