//! HTTP handlers for the customer map

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::models::{Customer, Role};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::customer::{CreateCustomerInput, UpdateCustomerInput};
use crate::services::customer_import::{ImportPreview, ImportRequest, ImportSummary};
use crate::services::CustomerService;
use crate::AppState;

const CUSTOMER_EDIT_ROLES: &[Role] = &[Role::Warehouse];

/// Customers with coordinates, for the map view
pub async fn list_customers(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Customer>>> {
    let service = CustomerService::new(state.db.clone(), &state.config);
    Ok(Json(service.list_located().await?))
}

pub async fn customers_geojson(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let service = CustomerService::new(state.db.clone(), &state.config);
    Ok(Json(service.geojson().await?))
}

pub async fn get_customer(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(customer_id): Path<i64>,
) -> AppResult<Json<Customer>> {
    let service = CustomerService::new(state.db.clone(), &state.config);
    Ok(Json(service.get_customer(customer_id).await?))
}

pub async fn create_customer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateCustomerInput>,
) -> AppResult<(StatusCode, Json<Customer>)> {
    current_user.0.require(CUSTOMER_EDIT_ROLES)?;
    let service = CustomerService::new(state.db.clone(), &state.config);
    let customer = service.create_customer(input).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn update_customer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(customer_id): Path<i64>,
    Json(input): Json<UpdateCustomerInput>,
) -> AppResult<Json<Customer>> {
    current_user.0.require(CUSTOMER_EDIT_ROLES)?;
    let service = CustomerService::new(state.db.clone(), &state.config);
    Ok(Json(service.update_customer(customer_id, input).await?))
}

pub async fn preview_import(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ImportRequest>,
) -> AppResult<Json<ImportPreview>> {
    current_user.0.require(CUSTOMER_EDIT_ROLES)?;
    let service = CustomerService::new(state.db.clone(), &state.config);
    Ok(Json(service.preview_import(&request)?))
}

pub async fn import_customers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ImportRequest>,
) -> AppResult<Json<ImportSummary>> {
    current_user.0.require(CUSTOMER_EDIT_ROLES)?;
    let service = CustomerService::new(state.db.clone(), &state.config);
    Ok(Json(service.import(request).await?))
}

/// Push a customer's point into the PostGIS geometry column
pub async fn sync_customer_geometry(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(customer_id): Path<i64>,
) -> AppResult<Json<Customer>> {
    current_user.0.require(CUSTOMER_EDIT_ROLES)?;
    let service = CustomerService::new(state.db.clone(), &state.config);
    Ok(Json(service.sync_geometry(customer_id).await?))
}
