//! Indicator catalog management.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::extract::{JsonBody, PathParams, QueryParams};
use super::session::CurrentUser;
use super::{load_indicator, load_project, require};
use crate::auth;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{Catalog, Indicator, NewIndicator};
use crate::state::AppState;
use crate::validation;

#[derive(Debug, Deserialize)]
struct CatalogFilter {
    catalog: Option<Catalog>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/projects/{id}/indicators",
            get(list_indicators).post(create_indicator),
        )
        .route(
            "/api/indicators/{catalog}/{id}",
            get(get_indicator)
                .put(update_indicator)
                .delete(delete_indicator),
        )
}

fn check_definition(input: &NewIndicator) -> ApiResult<()> {
    let violations = validation::validate_definition(input);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ApiError::invalid(&violations))
    }
}

/// GET /api/projects/{id}/indicators?catalog=
async fn list_indicators(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    PathParams(project_id): PathParams<Uuid>,
    QueryParams(filter): QueryParams<CatalogFilter>,
) -> ApiResult<Json<Vec<Indicator>>> {
    require(auth::can_view_project(&user, project_id), "view this project")?;
    load_project(&state, project_id).await?;
    let indicators =
        db::indicators::list_indicators(&state.pool, project_id, filter.catalog).await?;
    Ok(Json(indicators))
}

/// POST /api/projects/{id}/indicators
async fn create_indicator(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    PathParams(project_id): PathParams<Uuid>,
    JsonBody(input): JsonBody<NewIndicator>,
) -> ApiResult<(StatusCode, Json<Indicator>)> {
    require(auth::can_manage_catalog(&user), "manage indicator catalogs")?;
    check_definition(&input)?;
    load_project(&state, project_id).await?;

    let indicator = db::indicators::create_indicator(&state.pool, project_id, &input).await?;
    tracing::info!(
        %project_id,
        catalog = %indicator.catalog(),
        code = %indicator.code,
        "indicator created"
    );
    Ok((StatusCode::CREATED, Json(indicator)))
}

/// GET /api/indicators/{catalog}/{id}
async fn get_indicator(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    PathParams((catalog, id)): PathParams<(Catalog, Uuid)>,
) -> ApiResult<Json<Indicator>> {
    let indicator = load_indicator(&state, catalog, id).await?;
    require(
        auth::can_view_project(&user, indicator.project_id),
        "view this indicator",
    )?;
    Ok(Json(indicator))
}

/// PUT /api/indicators/{catalog}/{id}
async fn update_indicator(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    PathParams((catalog, id)): PathParams<(Catalog, Uuid)>,
    JsonBody(input): JsonBody<NewIndicator>,
) -> ApiResult<Json<Indicator>> {
    require(auth::can_manage_catalog(&user), "manage indicator catalogs")?;
    if input.shape.catalog() != catalog {
        return Err(ApiError::bad_request(format!(
            "indicator cannot move from {catalog} to {}",
            input.shape.catalog()
        )));
    }
    check_definition(&input)?;

    let current = load_indicator(&state, catalog, id).await?;
    let recorded = db::values::list_measurements(&state.pool, &current).await?;
    let conflicts = validation::definition_change_conflicts(&current, &input, &recorded);
    if !conflicts.is_empty() {
        let reasons: Vec<String> = conflicts.iter().map(ToString::to_string).collect();
        return Err(ApiError::Conflict(reasons.join("; ")));
    }

    let indicator = db::indicators::update_indicator(&state.pool, catalog, id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{catalog} indicator {id}")))?;
    Ok(Json(indicator))
}

/// DELETE /api/indicators/{catalog}/{id}
///
/// Recorded values of the indicator are removed with it.
async fn delete_indicator(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    PathParams((catalog, id)): PathParams<(Catalog, Uuid)>,
) -> ApiResult<StatusCode> {
    require(auth::can_manage_catalog(&user), "manage indicator catalogs")?;
    if !db::indicators::delete_indicator(&state.pool, catalog, id).await? {
        return Err(ApiError::not_found(format!("{catalog} indicator {id}")));
    }
    tracing::info!(%catalog, indicator_id = %id, by = %user.id, "indicator deleted");
    Ok(StatusCode::NO_CONTENT)
}
