//! Label issuance and lifecycle for per-unit QR tracking

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{
    generate_label_token, issue_decision, plan_label_issue, IssuableLine, IssueDecision, Label,
    LabelStatus, OrderState,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::qr::QrRenderer;

/// Label service: mints labels for purchase orders and moves them through their lifecycle
#[derive(Clone)]
pub struct LabelService {
    db: PgPool,
    renderer: QrRenderer,
    max_attempts: u32,
}

/// Result of a label issuance run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueReport {
    pub ok: bool,
    pub issued: u32,
    /// Labels persisted without a QR image because rendering failed
    pub render_skipped: u32,
    /// The order already had its labels; nothing was minted
    pub already_generated: bool,
}

impl IssueReport {
    /// Report for an order whose labels were minted earlier
    pub fn already_generated() -> Self {
        Self {
            ok: true,
            already_generated: true,
            ..Default::default()
        }
    }
}

/// Input for recording a sale of a received unit
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellLabelInput {
    pub sales_ref: Option<String>,
    pub customer_name: Option<String>,
}

/// One row of the printable label sheet
#[derive(Debug, Serialize)]
pub struct LabelSheetRow {
    pub token: String,
    pub item_code: String,
    pub product_name: String,
    pub purchase_name: Option<String>,
    pub supplier_name: Option<String>,
    pub status: String,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct LabelRow {
    pub id: i64,
    pub token: String,
    pub product_id: i64,
    pub purchase_order_id: Option<i64>,
    pub status: String,
    pub qr_svg: Option<String>,
    pub supplier_name: Option<String>,
    pub purchase_name: Option<String>,
    pub purchase_date: Option<DateTime<Utc>>,
    pub sales_ref: Option<String>,
    pub customer_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const LABEL_COLUMNS: &str = "id, token, product_id, purchase_order_id, status, qr_svg, \
     supplier_name, purchase_name, purchase_date, sales_ref, customer_name, created_at, updated_at";

pub(crate) fn parse_label_status(status: &str) -> AppResult<LabelStatus> {
    LabelStatus::parse(status)
        .ok_or_else(|| AppError::Internal(format!("Unknown label status '{}'", status)))
}

impl LabelRow {
    pub(crate) fn into_label(self) -> AppResult<Label> {
        Ok(Label {
            status: parse_label_status(&self.status)?,
            id: self.id,
            token: self.token,
            product_id: self.product_id,
            purchase_order_id: self.purchase_order_id,
            qr_svg: self.qr_svg,
            supplier_name: self.supplier_name,
            purchase_name: self.purchase_name,
            purchase_date: self.purchase_date,
            sales_ref: self.sales_ref,
            customer_name: self.customer_name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Order lines joined with the product fields issuance and receipt planning need
pub(crate) async fn load_issuable_lines(
    conn: &mut PgConnection,
    order_id: i64,
) -> AppResult<Vec<IssuableLine>> {
    let lines = sqlx::query_as::<_, (i64, Option<String>, bool, Decimal)>(
        r#"
        SELECT l.product_id, p.item_code, p.qr_enabled, l.quantity
        FROM purchase_order_lines l
        JOIN products p ON p.id = l.product_id
        WHERE l.order_id = $1
        ORDER BY l.id
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|(product_id, item_code, qr_enabled, quantity)| IssuableLine {
        product_id,
        item_code,
        qr_enabled,
        quantity,
    })
    .collect();
    Ok(lines)
}

impl LabelService {
    /// Create a new LabelService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            renderer: QrRenderer::new(config.receiving.qr_min_size),
            max_attempts: config.receiving.token_max_attempts.max(1),
        }
    }

    /// Mint labels for an order in its own transaction
    pub async fn issue_for_order(&self, order_id: i64) -> AppResult<IssueReport> {
        let mut tx = self.db.begin().await?;
        let report = self.issue_labels(&mut tx, order_id).await?;
        tx.commit().await?;
        Ok(report)
    }

    /// Mint one label per unit of every QR-enabled line on a confirmed order.
    ///
    /// Locks the order row; once `labels_generated` is set further calls mint nothing.
    pub(crate) async fn issue_labels(
        &self,
        conn: &mut PgConnection,
        order_id: i64,
    ) -> AppResult<IssueReport> {
        let (order_name, supplier_name, state, labels_generated, ordered_at) =
            sqlx::query_as::<_, (String, String, String, bool, DateTime<Utc>)>(
                r#"
                SELECT name, supplier_name, state, labels_generated, ordered_at
                FROM purchase_orders
                WHERE id = $1
                FOR UPDATE
                "#,
            )
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;

        let state = OrderState::parse(&state)
            .ok_or_else(|| AppError::Internal(format!("Unknown order state '{}'", state)))?;

        if issue_decision(state, labels_generated)? == IssueDecision::AlreadyGenerated {
            tracing::debug!("Labels already generated for order {}", order_name);
            return Ok(IssueReport::already_generated());
        }

        let lines = load_issuable_lines(conn, order_id).await?;

        let mut report = IssueReport {
            ok: true,
            ..Default::default()
        };

        for request in plan_label_issue(&lines) {
            for _ in 0..request.units {
                let rendered = self
                    .insert_unique_label(
                        conn,
                        NewLabel {
                            order_id,
                            order_name: &order_name,
                            product_id: request.product_id,
                            product_code: &request.product_code,
                            supplier_name: &supplier_name,
                            ordered_at,
                        },
                    )
                    .await?;
                report.issued += 1;
                if !rendered {
                    report.render_skipped += 1;
                }
            }
        }

        sqlx::query("UPDATE purchase_orders SET labels_generated = TRUE WHERE id = $1")
            .bind(order_id)
            .execute(&mut *conn)
            .await?;

        tracing::info!(
            "Issued {} labels for order {} ({} without QR image)",
            report.issued,
            order_name,
            report.render_skipped
        );

        Ok(report)
    }

    /// Insert a label with a fresh token, retrying on token collisions.
    /// Returns whether the QR image was rendered.
    async fn insert_unique_label(
        &self,
        conn: &mut PgConnection,
        label: NewLabel<'_>,
    ) -> AppResult<bool> {
        for attempt in 1..=self.max_attempts {
            let random = Uuid::new_v4().simple().to_string();
            let token = generate_label_token(label.order_name, label.product_code, &random);

            let qr_svg = match self.renderer.render_svg(&token) {
                Ok(svg) => Some(svg),
                Err(e) => {
                    tracing::warn!("Skipping QR image for label {}: {}", token, e);
                    None
                }
            };
            let rendered = qr_svg.is_some();

            let inserted = sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO labels (token, product_id, purchase_order_id, status, qr_svg,
                                    supplier_name, purchase_name, purchase_date)
                VALUES ($1, $2, $3, 'created', $4, $5, $6, $7)
                ON CONFLICT (token) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(&token)
            .bind(label.product_id)
            .bind(label.order_id)
            .bind(qr_svg)
            .bind(label.supplier_name)
            .bind(label.order_name)
            .bind(label.ordered_at)
            .fetch_optional(&mut *conn)
            .await?;

            if inserted.is_some() {
                return Ok(rendered);
            }
            tracing::warn!("Token collision on attempt {} for {}", attempt, token);
        }

        Err(AppError::validation(
            "token",
            format!(
                "Could not mint a unique label token after {} attempts",
                self.max_attempts
            ),
        ))
    }

    /// Get a label by id
    pub async fn get_label(&self, label_id: i64) -> AppResult<Label> {
        sqlx::query_as::<_, LabelRow>(&format!(
            "SELECT {} FROM labels WHERE id = $1",
            LABEL_COLUMNS
        ))
        .bind(label_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Label".to_string()))?
        .into_label()
    }

    /// Resolve a scanned token
    pub async fn get_by_token(&self, token: &str) -> AppResult<Label> {
        sqlx::query_as::<_, LabelRow>(&format!(
            "SELECT {} FROM labels WHERE token = $1",
            LABEL_COLUMNS
        ))
        .bind(token.trim())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Label".to_string()))?
        .into_label()
    }

    /// All labels minted for an order
    pub async fn list_for_order(&self, order_id: i64) -> AppResult<Vec<Label>> {
        sqlx::query_as::<_, LabelRow>(&format!(
            "SELECT {} FROM labels WHERE purchase_order_id = $1 ORDER BY id",
            LABEL_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(LabelRow::into_label)
        .collect()
    }

    /// Label sheet rows for printing
    pub async fn label_sheet(&self, order_id: i64) -> AppResult<Vec<LabelSheetRow>> {
        let rows = sqlx::query_as::<_, (String, String, String, Option<String>, Option<String>, String)>(
            r#"
            SELECT l.token, p.item_code, p.name, l.purchase_name, l.supplier_name, l.status
            FROM labels l
            JOIN products p ON p.id = l.product_id
            WHERE l.purchase_order_id = $1
            ORDER BY l.id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| LabelSheetRow {
                token: r.0,
                item_code: r.1,
                product_name: r.2,
                purchase_name: r.3,
                supplier_name: r.4,
                status: r.5,
            })
            .collect())
    }

    /// Record the sale of a received unit
    pub async fn sell(&self, label_id: i64, input: SellLabelInput) -> AppResult<Label> {
        let mut tx = self.db.begin().await?;
        let current = lock_label_status(&mut tx, label_id).await?;
        let next = current.transition(LabelStatus::Sold)?;

        let label = sqlx::query_as::<_, LabelRow>(&format!(
            r#"
            UPDATE labels
            SET status = $1, sales_ref = $2, customer_name = $3, updated_at = NOW()
            WHERE id = $4
            RETURNING {}
            "#,
            LABEL_COLUMNS
        ))
        .bind(next.as_str())
        .bind(input.sales_ref)
        .bind(input.customer_name)
        .bind(label_id)
        .fetch_one(&mut *tx)
        .await?
        .into_label()?;

        tx.commit().await?;
        tracing::info!("Label {} sold", label.token);
        Ok(label)
    }

    /// Record a returned unit
    pub async fn mark_returned(&self, label_id: i64) -> AppResult<Label> {
        let mut tx = self.db.begin().await?;
        let current = lock_label_status(&mut tx, label_id).await?;
        let next = current.transition(LabelStatus::Returned)?;

        let label = sqlx::query_as::<_, LabelRow>(&format!(
            "UPDATE labels SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            LABEL_COLUMNS
        ))
        .bind(next.as_str())
        .bind(label_id)
        .fetch_one(&mut *tx)
        .await?
        .into_label()?;

        tx.commit().await?;
        tracing::info!("Label {} returned", label.token);
        Ok(label)
    }

    /// Export rows as CSV
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}

struct NewLabel<'a> {
    order_id: i64,
    order_name: &'a str,
    product_id: i64,
    product_code: &'a str,
    supplier_name: &'a str,
    ordered_at: DateTime<Utc>,
}

async fn lock_label_status(conn: &mut PgConnection, label_id: i64) -> AppResult<LabelStatus> {
    let status: String = sqlx::query_scalar("SELECT status FROM labels WHERE id = $1 FOR UPDATE")
        .bind(label_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Label".to_string()))?;
    parse_label_status(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_sheet_csv() {
        let rows = vec![LabelSheetRow {
            token: "PO0001-ITM-000001-9f2c1a7e".to_string(),
            item_code: "ITM-000001".to_string(),
            product_name: "Inverter 5kW".to_string(),
            purchase_name: Some("PO0001".to_string()),
            supplier_name: None,
            status: "created".to_string(),
        }];
        let csv = LabelService::export_to_csv(&rows).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("token,item_code,product_name,purchase_name,supplier_name,status")
        );
        assert_eq!(
            lines.next(),
            Some("PO0001-ITM-000001-9f2c1a7e,ITM-000001,Inverter 5kW,PO0001,,created")
        );
    }

    #[test]
    fn test_repeat_issue_mints_nothing() {
        assert_eq!(
            issue_decision(OrderState::Confirmed, true),
            Ok(IssueDecision::AlreadyGenerated)
        );
        let body = serde_json::to_value(IssueReport::already_generated()).unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(body["issued"], 0);
        assert_eq!(body["renderSkipped"], 0);
        assert_eq!(body["alreadyGenerated"], true);
    }
}
