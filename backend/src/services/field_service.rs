//! Field-service orders for the technician mobile app

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::models::{AttachmentInfo, ChecklistItem, DoneState, FsmOrder, FsmStage};
use sqlx::{PgConnection, PgPool};
use validator::Validate;

use crate::error::{AppError, AppResult};

const DEFAULT_LIST_LIMIT: i64 = 100;
const MAX_LIST_LIMIT: i64 = 500;
const DEFAULT_CHECKLIST_NAME: &str = "Checklist item";
const DEFAULT_ATTACHMENT_NAME: &str = "file.bin";
const DEFAULT_MIMETYPE: &str = "application/octet-stream";
const ATTACHMENT_MODEL: &str = "fsm.order";

/// Field service
#[derive(Clone)]
pub struct FieldService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFsmOrderInput {
    #[validate(length(min = 1, max = 255, message = "Order name is required"))]
    pub name: String,
    pub technician_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub scheduled_start: Option<DateTime<Utc>>,
    /// Checklist item names to seed the order with
    #[serde(default)]
    pub checklist: Vec<String>,
}

/// One stage or several
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StageFilter {
    One(String),
    Many(Vec<String>),
}

impl StageFilter {
    fn codes(&self) -> Vec<String> {
        let names: Vec<&str> = match self {
            StageFilter::One(name) => vec![name.as_str()],
            StageFilter::Many(names) => names.iter().map(String::as_str).collect(),
        };
        names
            .into_iter()
            .filter_map(FsmStage::parse)
            .map(|s| s.as_str().to_string())
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAssignedInput {
    #[serde(alias = "state")]
    pub stage: Option<StageFilter>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFsmOrderInput {
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub install_lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub install_lon: Option<f64>,
    #[serde(alias = "state")]
    pub stage: Option<String>,
    #[serde(default)]
    pub checklist: Vec<ChecklistInput>,
    #[serde(default)]
    pub attachments: Vec<AttachmentInput>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistInput {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub is_done: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInput {
    pub name: Option<String>,
    pub mimetype: Option<String>,
    pub content_base64: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AssignedOrders {
    pub orders: Vec<FsmOrder>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub success: bool,
    pub order_id: i64,
}

/// Transfer reference shown on an order
#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RelatedTransfer {
    pub id: i64,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FsmOrderDetail {
    #[serde(flatten)]
    pub order: FsmOrder,
    pub checklist: Vec<ChecklistItem>,
    pub attachments: Vec<AttachmentInfo>,
    pub transfers: Vec<RelatedTransfer>,
}

#[derive(Debug, sqlx::FromRow)]
struct FsmOrderRow {
    id: i64,
    name: String,
    technician_id: Option<i64>,
    customer_id: Option<i64>,
    stage: String,
    install_lat: Option<f64>,
    install_lon: Option<f64>,
    scheduled_start: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FsmOrderRow {
    fn into_order(self) -> AppResult<FsmOrder> {
        let stage = FsmStage::parse(&self.stage)
            .ok_or_else(|| AppError::Internal(format!("Unknown stage '{}'", self.stage)))?;
        Ok(FsmOrder {
            id: self.id,
            name: self.name,
            technician_id: self.technician_id,
            customer_id: self.customer_id,
            stage,
            install_lat: self.install_lat,
            install_lon: self.install_lon,
            scheduled_start: self.scheduled_start,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChecklistRow {
    id: i64,
    fsm_order_id: i64,
    name: String,
    is_done: bool,
    done_by: Option<i64>,
    done_date: Option<DateTime<Utc>>,
}

impl From<ChecklistRow> for ChecklistItem {
    fn from(row: ChecklistRow) -> Self {
        ChecklistItem {
            id: row.id,
            fsm_order_id: row.fsm_order_id,
            name: row.name,
            is_done: row.is_done,
            done_by: row.done_by,
            done_date: row.done_date,
        }
    }
}

const ORDER_COLUMNS: &str = "id, name, technician_id, customer_id, stage, install_lat, \
     install_lon, scheduled_start, created_at, updated_at";

/// Clamp the requested page size
pub fn effective_limit(limit: Option<i64>) -> i64 {
    match limit {
        Some(n) if n > 0 => n.min(MAX_LIST_LIMIT),
        _ => DEFAULT_LIST_LIMIT,
    }
}

/// Decode an attachment payload; `Ok(None)` when there is nothing to store
pub fn decode_attachment(content: Option<&str>) -> Result<Option<Vec<u8>>, base64::DecodeError> {
    match content.map(str::trim) {
        None | Some("") => Ok(None),
        Some(data) => STANDARD.decode(data).map(Some),
    }
}

impl FieldService {
    /// Create a new FieldService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create an order, optionally with checklist items
    pub async fn create_order(&self, input: CreateFsmOrderInput) -> AppResult<FsmOrderDetail> {
        input.validate()?;
        let stage = if input.technician_id.is_some() {
            FsmStage::Assigned
        } else {
            FsmStage::New
        };

        let mut tx = self.db.begin().await?;
        let order_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO fsm_orders (name, technician_id, customer_id, stage, scheduled_start)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(input.name.trim())
        .bind(input.technician_id)
        .bind(input.customer_id)
        .bind(stage.as_str())
        .bind(input.scheduled_start)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::missing_reference)?;

        for name in input.checklist.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            insert_checklist_item(&mut tx, order_id, name, &DoneState::pending()).await?;
        }
        tx.commit().await?;

        tracing::info!("Created field service order {}", order_id);
        self.get_order(order_id).await
    }

    /// Order with checklist, attachment metadata and related transfers
    pub async fn get_order(&self, order_id: i64) -> AppResult<FsmOrderDetail> {
        let order = self.load_order(order_id).await?;

        let checklist = sqlx::query_as::<_, ChecklistRow>(
            r#"
            SELECT id, fsm_order_id, name, is_done, done_by, done_date
            FROM installation_checklist
            WHERE fsm_order_id = $1
            ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(ChecklistItem::from)
        .collect();

        let attachments = sqlx::query_as::<_, (i64, String, String, i64, DateTime<Utc>)>(
            r#"
            SELECT id, name, mimetype, octet_length(data)::BIGINT, created_at
            FROM attachments
            WHERE res_model = $1 AND res_id = $2
            ORDER BY id
            "#,
        )
        .bind(ATTACHMENT_MODEL)
        .bind(order_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(|(id, name, mimetype, size_bytes, created_at)| AttachmentInfo {
            id,
            name,
            mimetype,
            size_bytes,
            created_at,
        })
        .collect();

        let transfers = sqlx::query_as::<_, RelatedTransfer>(
            "SELECT id, name, status FROM transfers WHERE fsm_order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        Ok(FsmOrderDetail {
            order,
            checklist,
            attachments,
            transfers,
        })
    }

    /// Orders assigned to a technician
    pub async fn list_assigned(
        &self,
        technician_id: i64,
        input: ListAssignedInput,
    ) -> AppResult<AssignedOrders> {
        let stages: Option<Vec<String>> = input.stage.as_ref().map(StageFilter::codes);

        let rows = sqlx::query_as::<_, FsmOrderRow>(&format!(
            r#"
            SELECT {} FROM fsm_orders
            WHERE technician_id = $1
              AND ($2::TEXT[] IS NULL OR stage = ANY($2))
            ORDER BY scheduled_start NULLS LAST, id
            LIMIT $3
            "#,
            ORDER_COLUMNS
        ))
        .bind(technician_id)
        .bind(stages)
        .bind(effective_limit(input.limit))
        .fetch_all(&self.db)
        .await?;

        let orders = rows
            .into_iter()
            .map(FsmOrderRow::into_order)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(AssignedOrders { orders })
    }

    /// Apply a technician's update: location, stage, checklist and photos.
    ///
    /// Checklist rows and attachments that fail are logged and skipped.
    pub async fn update_order(
        &self,
        order_id: i64,
        user_id: i64,
        input: UpdateFsmOrderInput,
    ) -> AppResult<UpdateResult> {
        input.validate()?;
        self.load_order(order_id).await?;

        let stage = match input.stage.as_deref() {
            Some(name) => {
                let parsed = FsmStage::parse(name);
                if parsed.is_none() {
                    tracing::warn!("Ignoring unknown stage '{}' for order {}", name, order_id);
                }
                parsed
            }
            None => None,
        };

        sqlx::query(
            r#"
            UPDATE fsm_orders
            SET install_lat = COALESCE($2, install_lat),
                install_lon = COALESCE($3, install_lon),
                stage = COALESCE($4, stage),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(input.install_lat)
        .bind(input.install_lon)
        .bind(stage.map(|s| s.as_str()))
        .execute(&self.db)
        .await?;

        for item in &input.checklist {
            if let Err(e) = self.apply_checklist_item(order_id, user_id, item).await {
                tracing::warn!("Failed to update checklist item {:?}: {}", item.id, e);
            }
        }

        for attachment in &input.attachments {
            if let Err(e) = self.store_attachment(order_id, user_id, attachment).await {
                tracing::warn!("Failed to create attachment for order {}: {}", order_id, e);
            }
        }

        Ok(UpdateResult {
            success: true,
            order_id,
        })
    }

    async fn load_order(&self, order_id: i64) -> AppResult<FsmOrder> {
        sqlx::query_as::<_, FsmOrderRow>(&format!(
            "SELECT {} FROM fsm_orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?
        .into_order()
    }

    async fn apply_checklist_item(
        &self,
        order_id: i64,
        user_id: i64,
        item: &ChecklistInput,
    ) -> AppResult<()> {
        let now = Utc::now();

        let Some(item_id) = item.id else {
            let name = item
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(DEFAULT_CHECKLIST_NAME);
            let state = DoneState::pending().mark(item.is_done.unwrap_or(false), user_id, now);
            let mut conn = self.db.acquire().await?;
            return insert_checklist_item(&mut conn, order_id, name, &state).await;
        };

        let current = sqlx::query_as::<_, ChecklistRow>(
            r#"
            SELECT id, fsm_order_id, name, is_done, done_by, done_date
            FROM installation_checklist
            WHERE id = $1 AND fsm_order_id = $2
            "#,
        )
        .bind(item_id)
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .map(ChecklistItem::from)
        .ok_or_else(|| AppError::NotFound("Checklist item".to_string()))?;

        let state = match item.is_done {
            Some(is_done) => current.done_state().mark(is_done, user_id, now),
            None => current.done_state(),
        };

        sqlx::query(
            r#"
            UPDATE installation_checklist
            SET name = COALESCE($2, name), is_done = $3, done_by = $4, done_date = $5
            WHERE id = $1
            "#,
        )
        .bind(item_id)
        .bind(item.name.as_deref().map(str::trim).filter(|n| !n.is_empty()))
        .bind(state.is_done)
        .bind(state.done_by)
        .bind(state.done_date)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn store_attachment(
        &self,
        order_id: i64,
        user_id: i64,
        attachment: &AttachmentInput,
    ) -> AppResult<()> {
        let data = decode_attachment(attachment.content_base64.as_deref())
            .map_err(|e| AppError::validation("contentBase64", e.to_string()))?;
        let Some(data) = data else {
            return Ok(());
        };

        sqlx::query(
            r#"
            INSERT INTO attachments (res_model, res_id, name, mimetype, data, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(ATTACHMENT_MODEL)
        .bind(order_id)
        .bind(attachment.name.as_deref().unwrap_or(DEFAULT_ATTACHMENT_NAME))
        .bind(attachment.mimetype.as_deref().unwrap_or(DEFAULT_MIMETYPE))
        .bind(data)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

async fn insert_checklist_item(
    conn: &mut PgConnection,
    order_id: i64,
    name: &str,
    state: &DoneState,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO installation_checklist (fsm_order_id, name, is_done, done_by, done_date)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(order_id)
    .bind(name)
    .bind(state.is_done)
    .bind(state.done_by)
    .bind(state.done_date)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_limit() {
        assert_eq!(effective_limit(None), 100);
        assert_eq!(effective_limit(Some(0)), 100);
        assert_eq!(effective_limit(Some(20)), 20);
        assert_eq!(effective_limit(Some(10_000)), 500);
    }

    #[test]
    fn test_stage_filter_accepts_string_or_list() {
        let one: ListAssignedInput = serde_json::from_str(r#"{"stage": "In Progress"}"#).unwrap();
        assert_eq!(one.stage.unwrap().codes(), vec!["in_progress"]);

        let many: ListAssignedInput =
            serde_json::from_str(r#"{"state": ["assigned", "bogus", "done"], "limit": 5}"#)
                .unwrap();
        assert_eq!(many.stage.unwrap().codes(), vec!["assigned", "done"]);
        assert_eq!(many.limit, Some(5));
    }

    #[test]
    fn test_decode_attachment() {
        assert_eq!(decode_attachment(None).unwrap(), None);
        assert_eq!(decode_attachment(Some("  ")).unwrap(), None);
        assert_eq!(
            decode_attachment(Some("aGVsbG8=")).unwrap(),
            Some(b"hello".to_vec())
        );
        assert!(decode_attachment(Some("not base64!")).is_err());
    }

    #[test]
    fn test_update_payload_defaults() {
        let input: UpdateFsmOrderInput = serde_json::from_str(
            r#"{"installLat": -6.2, "checklist": [{"id": 12, "isDone": true}, {"name": "Grounding checked"}]}"#,
        )
        .unwrap();
        assert_eq!(input.install_lat, Some(-6.2));
        assert_eq!(input.checklist.len(), 2);
        assert_eq!(input.checklist[0].id, Some(12));
        assert!(input.checklist[1].id.is_none());
        assert!(input.attachments.is_empty());
    }
}
