//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: anonymous sign-in and logout.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::adapters::TOKEN_TTL_DAYS;
use crate::web::{middleware::request_token, state::AppState};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub anonymous: bool,
    /// Present this as `Authorization: Bearer <token>`, as the `session` cookie,
    /// or as the `token` query parameter of `/ws`.
    pub token: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/anonymous - Sign in as a new anonymous user
#[utoipa::path(
    post,
    path = "/auth/anonymous",
    responses(
        (status = 201, description = "Anonymous user created", body = AuthResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn anonymous_signin_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (identity, token) = state.credentials.issue_anonymous().await.map_err(|e| {
        error!("Failed to issue anonymous session: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to sign in".to_string())
    })?;
    info!(user_id = %identity.user_id, "Anonymous user signed in.");

    let cookie = format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        token,
        Duration::days(TOKEN_TTL_DAYS).num_seconds()
    );

    let response = AuthResponse {
        user_id: identity.user_id,
        anonymous: identity.anonymous,
        token,
    };

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(response),
    ))
}

/// POST /auth/logout - Revoke the session token
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let token = request_token(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state.credentials.revoke_token(&token).await.map_err(|e| {
        error!("Failed to revoke session token: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
    })?;

    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}
