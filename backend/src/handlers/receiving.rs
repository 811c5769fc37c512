//! HTTP handlers for purchase orders, labels, transfers and scanning

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use shared::models::{Label, PurchaseOrder, Role, Transfer};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::label::{IssueReport, SellLabelInput};
use crate::services::purchase::{ConfirmResult, CreateOrderInput};
use crate::services::receiving::{ReceiveLineInput, ReceiveLineResult, ScanResult};
use crate::services::transfer::CreateTransferInput;
use crate::services::{LabelService, PurchaseService, ReceivingService, TransferService};
use crate::AppState;

/// Roles allowed to work the receiving dock (admins always pass)
const RECEIVING_ROLES: &[Role] = &[Role::Warehouse];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub token: String,
    pub transfer_id: i64,
}

// ============================================================================
// Scanning
// ============================================================================

/// Reconcile a scanned QR token against a transfer
pub async fn scan_label(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(body): Json<ScanRequest>,
) -> AppResult<Json<ScanResult>> {
    current_user.0.require(RECEIVING_ROLES)?;
    let service = ReceivingService::new(state.db.clone(), &state.config);
    let result = service
        .scan(&body.token, body.transfer_id, Some(current_user.0.user_id))
        .await?;
    Ok(Json(result))
}

// ============================================================================
// Purchase orders
// ============================================================================

pub async fn create_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<(StatusCode, Json<PurchaseOrder>)> {
    current_user.0.require(RECEIVING_ROLES)?;
    let service = PurchaseService::new(state.db.clone(), &state.config);
    let order = service.create_order(input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(order_id): Path<i64>,
) -> AppResult<Json<PurchaseOrder>> {
    let service = PurchaseService::new(state.db.clone(), &state.config);
    let order = service.get_order(order_id).await?;
    Ok(Json(order))
}

/// Confirm an order: opens the receipt transfer and mints labels
pub async fn confirm_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<i64>,
) -> AppResult<Json<ConfirmResult>> {
    current_user.0.require(RECEIVING_ROLES)?;
    let service = PurchaseService::new(state.db.clone(), &state.config);
    let result = service.confirm_order(order_id).await?;
    Ok(Json(result))
}

// ============================================================================
// Labels
// ============================================================================

/// Mint labels for a confirmed order
pub async fn generate_labels(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<i64>,
) -> AppResult<Json<IssueReport>> {
    current_user.0.require(RECEIVING_ROLES)?;
    let service = LabelService::new(state.db.clone(), &state.config);
    let report = service.issue_for_order(order_id).await?;
    Ok(Json(report))
}

pub async fn list_order_labels(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(order_id): Path<i64>,
) -> AppResult<Json<Vec<Label>>> {
    let service = LabelService::new(state.db.clone(), &state.config);
    let labels = service.list_for_order(order_id).await?;
    Ok(Json(labels))
}

/// Printable label sheet as CSV
pub async fn export_order_labels(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(order_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let service = LabelService::new(state.db.clone(), &state.config);
    let rows = service.label_sheet(order_id).await?;
    let csv = LabelService::export_to_csv(&rows)?;
    let disposition = format!("attachment; filename=\"labels_{}.csv\"", order_id);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}

pub async fn get_label_by_token(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(token): Path<String>,
) -> AppResult<Json<Label>> {
    let service = LabelService::new(state.db.clone(), &state.config);
    let label = service.get_by_token(&token).await?;
    Ok(Json(label))
}

pub async fn sell_label(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(label_id): Path<i64>,
    body: Option<Json<SellLabelInput>>,
) -> AppResult<Json<Label>> {
    current_user.0.require(RECEIVING_ROLES)?;
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let service = LabelService::new(state.db.clone(), &state.config);
    let label = service.sell(label_id, input).await?;
    Ok(Json(label))
}

pub async fn return_label(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(label_id): Path<i64>,
) -> AppResult<Json<Label>> {
    current_user.0.require(RECEIVING_ROLES)?;
    let service = LabelService::new(state.db.clone(), &state.config);
    let label = service.mark_returned(label_id).await?;
    Ok(Json(label))
}

// ============================================================================
// Transfers
// ============================================================================

pub async fn create_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateTransferInput>,
) -> AppResult<(StatusCode, Json<Transfer>)> {
    current_user.0.require(RECEIVING_ROLES)?;
    let service = TransferService::new(state.db.clone());
    let transfer = service.create_transfer(input).await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

pub async fn get_transfer(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(transfer_id): Path<i64>,
) -> AppResult<Json<Transfer>> {
    let service = TransferService::new(state.db.clone());
    let transfer = service.get_transfer(transfer_id).await?;
    Ok(Json(transfer))
}

/// Finish a transfer that auto-validation left open
pub async fn validate_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<i64>,
) -> AppResult<Json<Transfer>> {
    current_user.0.require(RECEIVING_ROLES)?;
    let service = TransferService::new(state.db.clone());
    let transfer = service.validate_transfer(transfer_id).await?;
    Ok(Json(transfer))
}

/// Book a hand-counted quantity on a line without QR labels
pub async fn receive_transfer_line(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((transfer_id, line_id)): Path<(i64, i64)>,
    Json(input): Json<ReceiveLineInput>,
) -> AppResult<Json<ReceiveLineResult>> {
    current_user.0.require(RECEIVING_ROLES)?;
    let service = ReceivingService::new(state.db.clone(), &state.config);
    let result = service.receive_line(transfer_id, line_id, input).await?;
    Ok(Json(result))
}
