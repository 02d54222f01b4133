//! Auth REST handlers
//!
//! `POST /api/register`, `POST /api/login`, `POST /api/refresh`. Login
//! failures return the same error for unknown user and wrong password so
//! the endpoint cannot be used for user enumeration.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::auth::{credentials, tokens};
use crate::error::{GatewayError, GatewayResult};
use crate::keys::UserKey;
use crate::model::PublicUser;
use crate::store;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: UserKey,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub user: PublicUser,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

/// Register a new user. The display name is unique.
pub async fn register(
    State(pool): State<SqlitePool>,
    Json(request): Json<RegisterRequest>,
) -> GatewayResult<Json<RegisterResponse>> {
    let username = request.username.trim();
    if username.is_empty() || username.len() > 32 {
        return Err(GatewayError::validation(
            "Username must be between 1 and 32 characters",
        ));
    }
    if request.password.len() < 8 {
        return Err(GatewayError::validation(
            "Password must be at least 8 characters",
        ));
    }

    let password_hash = credentials::hash(&request.password)?;
    let user = store::users::create_user(
        &pool,
        username,
        &password_hash,
        request.avatar_url.as_deref(),
    )
    .await?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok(Json(RegisterResponse {
        user_id: user.id,
        username: user.username,
    }))
}

/// Authenticate and hand out an access/refresh token pair.
pub async fn login(
    State(pool): State<SqlitePool>,
    Json(request): Json<LoginRequest>,
) -> GatewayResult<Json<AuthResponse>> {
    let user = store::users::get_user_by_username(&pool, request.username.trim())
        .await?
        .ok_or_else(|| GatewayError::auth("Incorrect username or password"))?;

    if !credentials::verify(&request.password, &user.password_hash) {
        tracing::warn!(user_id = %user.id, "failed login attempt");
        return Err(GatewayError::auth("Incorrect username or password"));
    }

    let access_token = tokens::issue_access_token(user.id)?;
    let refresh_token = tokens::issue_refresh_token(user.id)?;

    tracing::info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        token_type: "bearer",
        user: user.public(),
    }))
}

/// Exchange a refresh token for a new access token.
pub async fn refresh(
    State(pool): State<SqlitePool>,
    Json(request): Json<RefreshRequest>,
) -> GatewayResult<Json<RefreshResponse>> {
    let user_id = tokens::verify_refresh_token(&request.refresh_token)?;

    // The account must still exist.
    store::users::get_user(&pool, user_id)
        .await?
        .ok_or_else(|| GatewayError::auth("Invalid or expired refresh token"))?;

    let access_token = tokens::issue_access_token(user_id)?;
    Ok(Json(RefreshResponse {
        access_token,
        token_type: "bearer",
    }))
}
