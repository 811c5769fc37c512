//! Receipt transfers: loading under lock, creation and finalize

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::models::{LabelStatus, Transfer, TransferLine, TransferStatus};
use sqlx::{PgConnection, PgPool};

use crate::error::{AppError, AppResult};

/// Transfer service
#[derive(Clone)]
pub struct TransferService {
    db: PgPool,
}

/// Input for creating a transfer by hand
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferInput {
    pub warehouse_id: i64,
    pub purchase_order_id: Option<i64>,
    pub fsm_order_id: Option<i64>,
    pub lines: Vec<CreateTransferLineInput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferLineInput {
    pub product_id: i64,
    pub expected_qty: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct TransferRow {
    id: i64,
    name: String,
    purchase_order_id: Option<i64>,
    warehouse_id: i64,
    fsm_order_id: Option<i64>,
    status: String,
    done_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TransferLineRow {
    pub id: i64,
    pub product_id: i64,
    pub expected_qty: Decimal,
    pub fulfilled_qty: Decimal,
    pub label_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<TransferLineRow> for TransferLine {
    fn from(row: TransferLineRow) -> Self {
        TransferLine {
            id: row.id,
            product_id: row.product_id,
            expected_qty: row.expected_qty,
            fulfilled_qty: row.fulfilled_qty,
            label_id: row.label_id,
            created_at: row.created_at,
        }
    }
}

pub(crate) const TRANSFER_LINE_COLUMNS: &str =
    "id, product_id, expected_qty, fulfilled_qty, label_id, created_at";

/// Load a transfer with its lines. With `lock` the transfer row is held `FOR UPDATE`
/// until the surrounding transaction ends.
pub(crate) async fn load_transfer(
    conn: &mut PgConnection,
    transfer_id: i64,
    lock: bool,
) -> AppResult<Transfer> {
    let sql = format!(
        r#"
        SELECT id, name, purchase_order_id, warehouse_id, fsm_order_id, status, done_at
        FROM transfers
        WHERE id = $1
        {}
        "#,
        if lock { "FOR UPDATE" } else { "" }
    );

    let row = sqlx::query_as::<_, TransferRow>(&sql)
        .bind(transfer_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Transfer".to_string()))?;

    let lines = sqlx::query_as::<_, TransferLineRow>(&format!(
        "SELECT {} FROM transfer_lines WHERE transfer_id = $1 ORDER BY created_at, id",
        TRANSFER_LINE_COLUMNS
    ))
    .bind(transfer_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(TransferLine::from)
    .collect();

    let status = TransferStatus::parse(&row.status)
        .ok_or_else(|| AppError::Internal(format!("Unknown transfer status '{}'", row.status)))?;

    Ok(Transfer {
        id: row.id,
        name: row.name,
        purchase_order_id: row.purchase_order_id,
        warehouse_id: row.warehouse_id,
        fsm_order_id: row.fsm_order_id,
        status,
        done_at: row.done_at,
        lines,
    })
}

/// Insert an open transfer and its planned lines, named from `transfer_name_seq`
pub(crate) async fn insert_transfer(
    conn: &mut PgConnection,
    warehouse_id: i64,
    purchase_order_id: Option<i64>,
    fsm_order_id: Option<i64>,
    lines: &[(i64, Decimal)],
) -> AppResult<i64> {
    let sequence: i64 = sqlx::query_scalar("SELECT nextval('transfer_name_seq')")
        .fetch_one(&mut *conn)
        .await?;
    let name = format_transfer_name(sequence);

    let transfer_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO transfers (name, purchase_order_id, warehouse_id, fsm_order_id, status)
        VALUES ($1, $2, $3, $4, 'open')
        RETURNING id
        "#,
    )
    .bind(&name)
    .bind(purchase_order_id)
    .bind(warehouse_id)
    .bind(fsm_order_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(AppError::missing_reference)?;

    for (product_id, expected_qty) in lines {
        sqlx::query(
            r#"
            INSERT INTO transfer_lines (transfer_id, product_id, expected_qty, fulfilled_qty)
            VALUES ($1, $2, $3, 0)
            "#,
        )
        .bind(transfer_id)
        .bind(product_id)
        .bind(expected_qty)
        .execute(&mut *conn)
        .await
        .map_err(AppError::missing_reference)?;
    }

    tracing::info!("Created transfer {} with {} lines", name, lines.len());
    Ok(transfer_id)
}

/// Receipt transfer names look like `WH/IN/00045`
pub fn format_transfer_name(sequence: i64) -> String {
    format!("WH/IN/{:05}", sequence)
}

/// Mark a locked transfer done: post stock and move its scanned labels to `received`.
///
/// Callers run this inside a savepoint or transaction; nothing is written when a
/// blocker is found.
pub(crate) async fn finalize(conn: &mut PgConnection, transfer: &Transfer) -> AppResult<()> {
    transfer.check_finalize()?;

    for (product_id, quantity) in transfer.received_quantities() {
        sqlx::query(
            r#"
            INSERT INTO stock_quants (product_id, warehouse_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (product_id, warehouse_id)
            DO UPDATE SET quantity = stock_quants.quantity + EXCLUDED.quantity
            "#,
        )
        .bind(product_id)
        .bind(transfer.warehouse_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;
    }

    let received = sqlx::query(
        r#"
        UPDATE labels
        SET status = $1, updated_at = NOW()
        WHERE status = $2
          AND id IN (SELECT label_id FROM transfer_scans WHERE transfer_id = $3)
        "#,
    )
    .bind(LabelStatus::Received.as_str())
    .bind(LabelStatus::Attached.as_str())
    .bind(transfer.id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    let updated = sqlx::query(
        "UPDATE transfers SET status = 'done', done_at = NOW() WHERE id = $1 AND status = 'open'",
    )
    .bind(transfer.id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(AppError::InvalidStateTransition(format!(
            "Transfer {} is not open",
            transfer.name
        )));
    }

    tracing::info!(
        "Transfer {} validated, {} labels received",
        transfer.name,
        received
    );
    Ok(())
}

impl TransferService {
    /// Create a new TransferService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create an open transfer
    pub async fn create_transfer(&self, input: CreateTransferInput) -> AppResult<Transfer> {
        if input.lines.is_empty() {
            return Err(AppError::validation("lines", "Transfer needs at least one line"));
        }
        if input.lines.iter().any(|l| l.expected_qty <= Decimal::ZERO) {
            return Err(AppError::validation(
                "expectedQty",
                "Expected quantity must be positive",
            ));
        }

        let lines: Vec<(i64, Decimal)> = input
            .lines
            .iter()
            .map(|l| (l.product_id, l.expected_qty))
            .collect();

        let mut tx = self.db.begin().await?;
        let transfer_id = insert_transfer(
            &mut tx,
            input.warehouse_id,
            input.purchase_order_id,
            input.fsm_order_id,
            &lines,
        )
        .await?;
        let transfer = load_transfer(&mut tx, transfer_id, false).await?;
        tx.commit().await?;

        Ok(transfer)
    }

    /// Get a transfer with its lines
    pub async fn get_transfer(&self, transfer_id: i64) -> AppResult<Transfer> {
        let mut conn = self.db.acquire().await?;
        load_transfer(&mut conn, transfer_id, false).await
    }

    /// Manually validate a transfer; blockers are reported to the caller
    pub async fn validate_transfer(&self, transfer_id: i64) -> AppResult<Transfer> {
        let mut tx = self.db.begin().await?;
        let transfer = load_transfer(&mut tx, transfer_id, true).await?;

        if !transfer.is_open() {
            return Err(AppError::validation(
                "transferId",
                format!("Transfer {} is already done", transfer.name),
            ));
        }

        finalize(&mut tx, &transfer).await?;
        let transfer = load_transfer(&mut tx, transfer_id, false).await?;
        tx.commit().await?;

        Ok(transfer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_name_is_zero_padded() {
        assert_eq!(format_transfer_name(45), "WH/IN/00045");
        assert_eq!(format_transfer_name(123456), "WH/IN/123456");
    }
}
