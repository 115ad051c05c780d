//! User administration, foundation only.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};

use super::extract::JsonBody;
use super::session::{hash_blocking, CurrentUser};
use super::{load_project, require};
use crate::auth;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{NewUser, User};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/users", get(list_users).post(create_user))
}

/// GET /api/users
async fn list_users(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<User>>> {
    require(auth::is_foundation(&user), "list users")?;
    Ok(Json(db::users::list_users(&state.pool).await?))
}

/// POST /api/users
async fn create_user(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    JsonBody(input): JsonBody<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    require(auth::is_foundation(&user), "create users")?;
    let problems = auth::check_new_user(&input);
    if !problems.is_empty() {
        return Err(ApiError::Invalid(problems));
    }
    if let Some(project_id) = input.project_id {
        load_project(&state, project_id).await?;
    }

    let hash = hash_blocking(input.password.clone()).await?;
    let created = db::users::create_user(&state.pool, &input, &hash).await?;
    tracing::info!(user_id = %created.id, role = %created.role, by = %user.id, "user created");
    Ok((StatusCode::CREATED, Json(created)))
}
