//! CSV import and export of a project's values.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::extract::{PathParams, QueryParams};
use super::session::CurrentUser;
use super::{load_project, require};
use crate::auth;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::export;
use crate::import::{self, ImportOptions};
use crate::models::ImportReport;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct ImportQuery {
    #[serde(default)]
    dry_run: bool,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/projects/{id}/export", get(export_values))
        .route("/api/projects/{id}/import", post(import_values))
}

/// GET /api/projects/{id}/export
async fn export_values(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    require(auth::can_view_project(&user, id), "export this project")?;
    let project = load_project(&state, id).await?;
    let mut measurements = db::values::list_project_measurements(&state.pool, id).await?;
    export::sort_for_export(&mut measurements);
    let body = export::to_csv_string(&measurements)?;

    let disposition = format!("attachment; filename=\"{}-valores.csv\"", project.code);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

/// POST /api/projects/{id}/import?dry_run=
///
/// The body is the CSV file. A missing header column rejects the whole file;
/// bad rows are listed in the report while the rest are stored.
async fn import_values(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    PathParams(id): PathParams<Uuid>,
    QueryParams(query): QueryParams<ImportQuery>,
    body: Bytes,
) -> ApiResult<Json<ImportReport>> {
    require(auth::can_record_values(&user, id), "import values for this project")?;
    load_project(&state, id).await?;

    let lines = import::read_rows(&body[..])
        .map_err(|err| ApiError::bad_request(format!("{err:#}")))?;
    let options = ImportOptions {
        dry_run: query.dry_run,
        recorded_by: Some(user.id),
        today: state.config.today(),
    };
    let report = import::import_lines(&state.pool, id, lines, options).await?;
    Ok(Json(report))
}
