//! HTTP handlers for the product master

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::models::{AlertStatus, Brand, Product, Role, Warehouse};

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::product::{
    CreateBrandInput, CreateProductInput, CreateWarehouseInput, ThresholdReport,
    UpdateProductInput, UpdateThresholdInput,
};
use crate::services::ProductService;
use crate::AppState;

const MASTER_DATA_ROLES: &[Role] = &[Role::Warehouse];

#[derive(Debug, Deserialize)]
pub struct ThresholdQuery {
    pub alert: Option<String>,
}

pub async fn list_brands(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Brand>>> {
    let service = ProductService::new(state.db);
    Ok(Json(service.list_brands().await?))
}

pub async fn create_brand(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateBrandInput>,
) -> AppResult<(StatusCode, Json<Brand>)> {
    current_user.0.require(MASTER_DATA_ROLES)?;
    let service = ProductService::new(state.db);
    let brand = service.create_brand(input).await?;
    Ok((StatusCode::CREATED, Json(brand)))
}

pub async fn list_products(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Product>>> {
    let service = ProductService::new(state.db);
    Ok(Json(service.list_products().await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<i64>,
) -> AppResult<Json<Product>> {
    let service = ProductService::new(state.db);
    Ok(Json(service.get_product(product_id).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    current_user.0.require(MASTER_DATA_ROLES)?;
    let service = ProductService::new(state.db);
    let product = service.create_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<i64>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    current_user.0.require(MASTER_DATA_ROLES)?;
    let service = ProductService::new(state.db);
    Ok(Json(service.update_product(product_id, input).await?))
}

pub async fn list_warehouses(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Warehouse>>> {
    let service = ProductService::new(state.db);
    Ok(Json(service.list_warehouses().await?))
}

pub async fn create_warehouse(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateWarehouseInput>,
) -> AppResult<(StatusCode, Json<Warehouse>)> {
    current_user.0.require(MASTER_DATA_ROLES)?;
    let service = ProductService::new(state.db);
    let warehouse = service.create_warehouse(input).await?;
    Ok((StatusCode::CREATED, Json(warehouse)))
}

/// Quick min/max edit for one product in one warehouse
pub async fn update_threshold(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((product_id, warehouse_id)): Path<(i64, i64)>,
    Json(input): Json<UpdateThresholdInput>,
) -> AppResult<Json<ThresholdReport>> {
    current_user.0.require(MASTER_DATA_ROLES)?;
    let service = ProductService::new(state.db);
    let report = service
        .update_threshold(product_id, warehouse_id, input)
        .await?;
    Ok(Json(report))
}

pub async fn list_thresholds(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ThresholdQuery>,
) -> AppResult<Json<Vec<ThresholdReport>>> {
    let alert = match query.alert.as_deref() {
        None | Some("") => None,
        Some(value) => Some(AlertStatus::parse(value).ok_or_else(|| {
            AppError::validation("alert", "Alert must be one of ok, under, over")
        })?),
    };

    let service = ProductService::new(state.db);
    Ok(Json(service.list_thresholds(alert).await?))
}
