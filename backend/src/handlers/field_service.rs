//! HTTP handlers for field-service orders and the technician mobile API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::models::Role;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::field_service::{
    AssignedOrders, CreateFsmOrderInput, FsmOrderDetail, ListAssignedInput, UpdateFsmOrderInput,
    UpdateResult,
};
use crate::services::FieldService;
use crate::AppState;

const TECHNICIAN_ROLES: &[Role] = &[Role::Technician];

/// Create a field-service order (admin only)
pub async fn create_fsm_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateFsmOrderInput>,
) -> AppResult<(StatusCode, Json<FsmOrderDetail>)> {
    current_user.0.require(&[Role::Admin])?;
    let service = FieldService::new(state.db);
    let order = service.create_order(input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_fsm_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<i64>,
) -> AppResult<Json<FsmOrderDetail>> {
    current_user.0.require(TECHNICIAN_ROLES)?;
    let service = FieldService::new(state.db);
    Ok(Json(service.get_order(order_id).await?))
}

/// Orders assigned to the calling technician
pub async fn list_assigned_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    body: Option<Json<ListAssignedInput>>,
) -> AppResult<Json<AssignedOrders>> {
    current_user.0.require(TECHNICIAN_ROLES)?;
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let service = FieldService::new(state.db);
    let orders = service
        .list_assigned(current_user.0.user_id, input)
        .await?;
    Ok(Json(orders))
}

/// Location, stage, checklist and photo update from the mobile app
pub async fn update_fsm_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<i64>,
    Json(input): Json<UpdateFsmOrderInput>,
) -> AppResult<Json<UpdateResult>> {
    current_user.0.require(TECHNICIAN_ROLES)?;
    let service = FieldService::new(state.db);
    let result = service
        .update_order(order_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(result))
}
