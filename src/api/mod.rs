//! HTTP routes.
//!
//! Every `/api` route except login requires a session; see [`session::CurrentUser`].

pub mod dashboard;
pub mod extract;
pub mod health;
pub mod indicators;
pub mod projects;
pub mod session;
pub mod transfer;
pub mod users;
pub mod values;

use std::sync::Arc;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{Catalog, Indicator, Project};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(session::router())
        .merge(users::router())
        .merge(projects::router())
        .merge(indicators::router())
        .merge(values::router())
        .merge(dashboard::router())
        .merge(transfer::router())
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn route_not_found() -> ApiError {
    ApiError::not_found("route")
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

pub(crate) fn require(allowed: bool, action: &str) -> ApiResult<()> {
    if allowed {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!("not allowed to {action}")))
    }
}

pub(crate) async fn load_project(state: &AppState, id: Uuid) -> ApiResult<Project> {
    db::projects::get_project(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("project {id}")))
}

pub(crate) async fn load_indicator(
    state: &AppState,
    catalog: Catalog,
    id: Uuid,
) -> ApiResult<Indicator> {
    db::indicators::get_indicator(&state.pool, catalog, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{catalog} indicator {id}")))
}
