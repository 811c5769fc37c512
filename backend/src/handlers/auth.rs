//! Authentication handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use shared::models::{Role, User};
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::auth::{AuthTokens, CreateUserInput, LoginResult};
use crate::services::AuthService;
use crate::AppState;

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(alias = "login")]
    #[validate(length(min = 1, message = "login and password required"))]
    pub email: String,
    #[validate(length(min = 1, message = "login and password required"))]
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 255, message = "Name cannot be empty"))]
    pub name: String,
    pub role: Role,
}

/// Login endpoint handler
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<LoginResult>> {
    body.validate()?;
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let result = auth_service.login(&body.email, &body.password).await?;
    Ok(Json(result))
}

/// Refresh token endpoint handler
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<AuthTokens>> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let tokens = auth_service.refresh_token(&body.refresh_token).await?;
    Ok(Json(tokens))
}

/// Create a user account (admin only)
pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(body): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    current_user.0.require(&[Role::Admin])?;
    body.validate()?;

    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let user = auth_service
        .create_user(CreateUserInput {
            email: body.email,
            password: body.password,
            name: body.name,
            role: body.role,
        })
        .await?;

    tracing::info!("User {} created by {}", user.id, current_user.0.user_id);
    Ok((StatusCode::CREATED, Json(user)))
}
