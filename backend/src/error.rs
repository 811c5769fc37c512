//! Error handling for the Warehouse Receiving Platform
//!
//! Every failure leaves the service as `{ "error": true, "code", "message", "field"? }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::models::{
    FinalizeBlocked, ManualReceiptRejection, OrderNotConfirmed, ScanRejection,
    StatusTransitionError, ThresholdError,
};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // External service errors
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Turn a unique-constraint violation into `DuplicateEntry(field)`
    pub fn unique_violation(err: sqlx::Error, field: &str) -> Self {
        let is_unique = err
            .as_database_error()
            .map(|db| db.is_unique_violation())
            .unwrap_or(false);
        if is_unique {
            AppError::DuplicateEntry(field.to_string())
        } else {
            AppError::DatabaseError(err)
        }
    }

    /// Turn a foreign-key violation into `NotFound` for the record it points at
    pub fn missing_reference(err: sqlx::Error) -> Self {
        let constraint = err
            .as_database_error()
            .filter(|db| db.is_foreign_key_violation())
            .map(|db| db.constraint().unwrap_or_default().to_string());
        match constraint {
            Some(constraint) => AppError::NotFound(referenced_resource(&constraint).to_string()),
            None => AppError::DatabaseError(err),
        }
    }
}

/// Resource named by a default `<table>_<column>_fkey` constraint
fn referenced_resource(constraint: &str) -> &'static str {
    const COLUMNS: &[(&str, &str)] = &[
        ("_purchase_order_id_", "Purchase order"),
        ("_fsm_order_id_", "Field service order"),
        ("_product_id_", "Product"),
        ("_warehouse_id_", "Warehouse"),
        ("_brand_id_", "Brand"),
        ("_technician_id_", "Technician"),
        ("_customer_id_", "Customer"),
    ];
    COLUMNS
        .iter()
        .find(|(column, _)| constraint.contains(column))
        .map(|(_, resource)| *resource)
        .unwrap_or("Referenced record")
}

impl From<ScanRejection> for AppError {
    fn from(rejection: ScanRejection) -> Self {
        AppError::validation("token", rejection.to_string())
    }
}

impl From<ManualReceiptRejection> for AppError {
    fn from(rejection: ManualReceiptRejection) -> Self {
        AppError::validation("quantity", rejection.to_string())
    }
}

impl From<OrderNotConfirmed> for AppError {
    fn from(err: OrderNotConfirmed) -> Self {
        AppError::validation("state", err.to_string())
    }
}

impl From<FinalizeBlocked> for AppError {
    fn from(blocked: FinalizeBlocked) -> Self {
        AppError::InvalidStateTransition(format!("Transfer cannot be validated: {}", blocked))
    }
}

impl From<StatusTransitionError> for AppError {
    fn from(err: StatusTransitionError) -> Self {
        AppError::InvalidStateTransition(err.to_string())
    }
}

impl From<ThresholdError> for AppError {
    fn from(err: ThresholdError) -> Self {
        AppError::validation("minQty", err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let (field, message) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{} is invalid", field));
                (field.to_string(), message)
            })
            .unwrap_or_else(|| ("body".to_string(), "Invalid request".to_string()));
        AppError::Validation { field, message }
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: true,
            code: code.to_string(),
            message: message.into(),
            field: None,
        }
    }

    fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("UNAUTHORIZED", msg.clone()),
            ),
            AppError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                ErrorResponse::new("FORBIDDEN", msg.clone()),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("VALIDATION_ERROR", message.clone()).with_field(field),
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("VALIDATION_ERROR", msg.clone()),
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorResponse::new(
                    "DUPLICATE_ENTRY",
                    format!("A record with this {} already exists", field),
                )
                .with_field(field),
            ),
            AppError::Conflict { resource, message } => (
                StatusCode::CONFLICT,
                ErrorResponse::new("CONFLICT", message.clone()).with_field(resource),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse::new("INVALID_STATE_TRANSITION", msg.clone()),
            ),
            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::new("SERVICE_UNAVAILABLE", msg.clone()),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("INTERNAL_ERROR", "An internal server error occurred"),
            ),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
