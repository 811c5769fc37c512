//! Purchase orders: drafting, confirmation and the receipt transfer that follows

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{plan_receipt_lines, OrderLine, OrderState, PurchaseOrder};
use sqlx::{PgConnection, PgPool};
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::label::{load_issuable_lines, IssueReport, LabelService};
use crate::services::transfer::insert_transfer;

/// Purchase order service
#[derive(Clone)]
pub struct PurchaseService {
    db: PgPool,
    labels: LabelService,
}

/// Input for drafting a purchase order
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderInput {
    /// Defaults to the next `PO0001`-style reference
    #[validate(length(min = 1, max = 64, message = "Order name must be 1-64 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Supplier name is required"))]
    pub supplier_name: String,
    pub warehouse_id: i64,
    #[validate(length(min = 1, message = "Order needs at least one line"))]
    pub lines: Vec<CreateOrderLineInput>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderLineInput {
    pub product_id: i64,
    pub quantity: Decimal,
}

/// Result of confirming an order
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResult {
    pub order: PurchaseOrder,
    /// None when no line has a whole unit to receive
    pub transfer_id: Option<i64>,
    pub labels: IssueReport,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    name: String,
    supplier_name: String,
    warehouse_id: i64,
    state: String,
    labels_generated: bool,
    ordered_at: DateTime<Utc>,
}

/// Purchase order references look like `PO0001`
pub fn format_order_name(sequence: i64) -> String {
    format!("PO{:04}", sequence)
}

impl PurchaseService {
    /// Create a new PurchaseService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            labels: LabelService::new(db.clone(), config),
            db,
        }
    }

    /// Draft a purchase order
    pub async fn create_order(&self, input: CreateOrderInput) -> AppResult<PurchaseOrder> {
        input.validate()?;
        if input.lines.iter().any(|l| l.quantity <= Decimal::ZERO) {
            return Err(AppError::validation("quantity", "Quantity must be positive"));
        }

        let mut tx = self.db.begin().await?;

        let name = match input.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                let sequence: i64 = sqlx::query_scalar("SELECT nextval('purchase_order_name_seq')")
                    .fetch_one(&mut *tx)
                    .await?;
                format_order_name(sequence)
            }
        };

        let order_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO purchase_orders (name, supplier_name, warehouse_id, state)
            VALUES ($1, $2, $3, 'draft')
            RETURNING id
            "#,
        )
        .bind(&name)
        .bind(input.supplier_name.trim())
        .bind(input.warehouse_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match AppError::unique_violation(e, "name") {
            AppError::DatabaseError(e) => AppError::missing_reference(e),
            other => other,
        })?;

        for line in &input.lines {
            sqlx::query(
                "INSERT INTO purchase_order_lines (order_id, product_id, quantity) VALUES ($1, $2, $3)",
            )
            .bind(order_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await
            .map_err(AppError::missing_reference)?;
        }

        let order = load_order(&mut tx, order_id, false).await?;
        tx.commit().await?;

        tracing::info!("Drafted purchase order {}", order.name);
        Ok(order)
    }

    /// Get a purchase order with its lines
    pub async fn get_order(&self, order_id: i64) -> AppResult<PurchaseOrder> {
        let mut conn = self.db.acquire().await?;
        load_order(&mut conn, order_id, false).await
    }

    /// Confirm a draft order, open its receipt transfer and mint its labels.
    ///
    /// QR-enabled lines expect one unit per minted label; other lines are received by hand.
    pub async fn confirm_order(&self, order_id: i64) -> AppResult<ConfirmResult> {
        let mut tx = self.db.begin().await?;
        let order = load_order(&mut tx, order_id, true).await?;

        if order.state != OrderState::Draft {
            return Err(AppError::InvalidStateTransition(format!(
                "Order {} is already confirmed",
                order.name
            )));
        }

        sqlx::query("UPDATE purchase_orders SET state = 'confirmed' WHERE id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        let receipt = plan_receipt_lines(&load_issuable_lines(&mut tx, order_id).await?);
        let transfer_id = if receipt.is_empty() {
            tracing::warn!("Order {} has nothing to receive; no transfer opened", order.name);
            None
        } else {
            Some(insert_transfer(&mut tx, order.warehouse_id, Some(order.id), None, &receipt).await?)
        };

        let labels = self.labels.issue_labels(&mut tx, order_id).await?;
        let order = load_order(&mut tx, order_id, false).await?;
        tx.commit().await?;

        tracing::info!("Confirmed purchase order {}", order.name);
        Ok(ConfirmResult {
            order,
            transfer_id,
            labels,
        })
    }
}

async fn load_order(
    conn: &mut PgConnection,
    order_id: i64,
    lock: bool,
) -> AppResult<PurchaseOrder> {
    let sql = format!(
        r#"
        SELECT id, name, supplier_name, warehouse_id, state, labels_generated, ordered_at
        FROM purchase_orders
        WHERE id = $1
        {}
        "#,
        if lock { "FOR UPDATE" } else { "" }
    );

    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;

    let lines = sqlx::query_as::<_, (i64, i64, Decimal)>(
        "SELECT id, product_id, quantity FROM purchase_order_lines WHERE order_id = $1 ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|(id, product_id, quantity)| OrderLine {
        id,
        product_id,
        quantity,
    })
    .collect();

    let state = OrderState::parse(&row.state)
        .ok_or_else(|| AppError::Internal(format!("Unknown order state '{}'", row.state)))?;

    Ok(PurchaseOrder {
        id: row.id,
        name: row.name,
        supplier_name: row.supplier_name,
        warehouse_id: row.warehouse_id,
        state,
        labels_generated: row.labels_generated,
        ordered_at: row.ordered_at,
        lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_name_format() {
        assert_eq!(format_order_name(1), "PO0001");
        assert_eq!(format_order_name(12345), "PO12345");
    }

    #[test]
    fn test_create_order_requires_lines() {
        let input = CreateOrderInput {
            name: None,
            supplier_name: "Solar Parts Co".to_string(),
            warehouse_id: 1,
            lines: vec![],
        };
        let err: AppError = input.validate().unwrap_err().into();
        match err {
            AppError::Validation { field, message } => {
                assert_eq!(field, "lines");
                assert_eq!(message, "Order needs at least one line");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
