//! Project CRUD.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::extract::{JsonBody, PathParams};
use super::session::CurrentUser;
use super::{load_project, require};
use crate::auth;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{Project, ProjectInput};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct CreateProjectRequest {
    #[serde(flatten)]
    project: ProjectInput,
    /// Copy the default indicator catalog into the new project.
    #[serde(default = "default_apply_template")]
    apply_template: bool,
}

fn default_apply_template() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct CreateProjectResponse {
    #[serde(flatten)]
    project: Project,
    indicators_added: usize,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
}

fn check_project(input: &ProjectInput) -> Vec<String> {
    [
        ("code", &input.code),
        ("name", &input.name),
        ("municipality", &input.municipality),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(field, _)| format!("{field} is empty"))
    .collect()
}

/// GET /api/projects
///
/// Municipal users only see their own project.
async fn list_projects(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<Project>>> {
    let projects = db::projects::list_projects(&state.pool)
        .await?
        .into_iter()
        .filter(|p| auth::can_view_project(&user, p.id))
        .collect();
    Ok(Json(projects))
}

/// POST /api/projects
async fn create_project(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<CreateProjectResponse>)> {
    require(auth::is_foundation(&user), "create projects")?;
    let problems = check_project(&request.project);
    if !problems.is_empty() {
        return Err(ApiError::Invalid(problems));
    }

    let (project, indicators_added) = db::projects::create_project_with_template(
        &state.pool,
        &request.project,
        request.apply_template,
    )
    .await?;
    tracing::info!(
        project_id = %project.id,
        code = %project.code,
        indicators_added,
        "project created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateProjectResponse {
            project,
            indicators_added,
        }),
    ))
}

/// GET /api/projects/{id}
async fn get_project(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<Json<Project>> {
    require(auth::can_view_project(&user, id), "view this project")?;
    Ok(Json(load_project(&state, id).await?))
}

/// PUT /api/projects/{id}
async fn update_project(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(input): JsonBody<ProjectInput>,
) -> ApiResult<Json<Project>> {
    require(auth::is_foundation(&user), "edit projects")?;
    let problems = check_project(&input);
    if !problems.is_empty() {
        return Err(ApiError::Invalid(problems));
    }
    let project = db::projects::update_project(&state.pool, id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("project {id}")))?;
    Ok(Json(project))
}

/// DELETE /api/projects/{id}
async fn delete_project(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<StatusCode> {
    require(auth::is_foundation(&user), "delete projects")?;
    if !db::projects::delete_project(&state.pool, id).await? {
        return Err(ApiError::not_found(format!("project {id}")));
    }
    tracing::info!(project_id = %id, by = %user.id, "project deleted");
    Ok(StatusCode::NO_CONTENT)
}
