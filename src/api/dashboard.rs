//! Aggregated views for the dashboard.

use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use super::extract::PathParams;
use super::session::CurrentUser;
use super::{load_project, require};
use crate::auth;
use crate::db;
use crate::error::ApiResult;
use crate::models::{Project, ProjectSummary};
use crate::report;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/projects/{id}/summary", get(project_summary))
        .route("/api/overview", get(overview))
        .route("/api/overview/report", get(overview_report))
}

async fn summarize(state: &AppState, project: &Project) -> ApiResult<ProjectSummary> {
    let indicators = db::indicators::list_indicators(&state.pool, project.id, None).await?;
    let measurements = db::values::list_project_measurements(&state.pool, project.id).await?;
    Ok(report::summarize_project(project, &indicators, &measurements))
}

async fn summarize_all(state: &AppState) -> ApiResult<Vec<ProjectSummary>> {
    let mut summaries = Vec::new();
    for project in db::projects::list_projects(&state.pool).await? {
        summaries.push(summarize(state, &project).await?);
    }
    Ok(summaries)
}

/// GET /api/projects/{id}/summary
async fn project_summary(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<Json<ProjectSummary>> {
    require(auth::can_view_project(&user, id), "view this project")?;
    let project = load_project(&state, id).await?;
    Ok(Json(summarize(&state, &project).await?))
}

/// GET /api/overview
async fn overview(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<ProjectSummary>>> {
    require(auth::is_foundation(&user), "view the cross-project overview")?;
    Ok(Json(summarize_all(&state).await?))
}

/// GET /api/overview/report
///
/// The overview as a markdown document.
async fn overview_report(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    require(auth::is_foundation(&user), "view the cross-project overview")?;
    let summaries = summarize_all(&state).await?;
    let body = report::build_report(&summaries, state.config.today());
    Ok(([(header::CONTENT_TYPE, "text/markdown; charset=utf-8")], body))
}
