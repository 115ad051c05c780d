//! Login, logout and the session extractor.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::extract::JsonBody;
use crate::auth::{self, AuthError};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::User;
use crate::state::AppState;

/// The user behind the request's session token.
///
/// Rejects with 401 when the token is missing, unknown or expired.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = auth::token_from_headers(&parts.headers).ok_or(AuthError::MissingToken)?;
        let user = db::users::user_for_session(&state.pool, &auth::token_digest(&token))
            .await?
            .ok_or_else(|| {
                tracing::debug!("unknown or expired session token");
                AuthError::InvalidSession
            })?;
        Ok(CurrentUser(user))
    }
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    expires_at: DateTime<Utc>,
    user: User,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

/// Password hashing is CPU-bound and runs off the async workers.
pub(crate) async fn hash_blocking(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .map_err(|err| ApiError::Internal(format!("password hashing failed: {err}")))?
        .map_err(ApiError::from)
}

/// Unknown accounts still pay for one verification, so both refusals take as long.
async fn verify_blocking(password: String, stored: Option<String>) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || match stored {
        Some(stored) => auth::verify_password(&password, &stored),
        None => auth::verify_unknown_account(&password),
    })
    .await
    .map_err(|err| ApiError::Internal(format!("password check failed: {err}")))
}

/// POST /api/auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = request.email.trim().to_lowercase();
    let Some((user, stored)) = db::users::find_credentials(&state.pool, &email).await? else {
        verify_blocking(request.password, None).await?;
        tracing::warn!(%email, "login for unknown email");
        return Err(AuthError::BadCredentials.into());
    };
    if !verify_blocking(request.password, Some(stored)).await? {
        tracing::warn!(user_id = %user.id, "login with wrong password");
        return Err(AuthError::BadCredentials.into());
    }

    let token = auth::new_session_token();
    let (ttl, expires_at) = auth::session_expiry(Utc::now(), state.config.session_ttl_hours)
        .ok_or_else(|| ApiError::Internal("session lifetime out of range".to_string()))?;
    db::users::create_session(&state.pool, user.id, &auth::token_digest(&token), expires_at)
        .await?;
    tracing::info!(user_id = %user.id, role = %user.role, "session opened");

    let cookie = auth::session_cookie(&token, ttl.num_seconds(), state.config.secure_cookies);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            token,
            expires_at,
            user,
        }),
    ))
}

/// POST /api/auth/logout
async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let token = auth::token_from_headers(&headers).ok_or(AuthError::MissingToken)?;
    if !db::users::delete_session(&state.pool, &auth::token_digest(&token)).await? {
        return Err(AuthError::InvalidSession.into());
    }
    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, auth::expired_cookie())],
    ))
}

/// GET /api/auth/me
async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}
