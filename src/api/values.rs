//! Recording measurements against indicators.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::NaiveDate;
use uuid::Uuid;

use super::extract::{JsonBody, PathParams};
use super::session::CurrentUser;
use super::{load_indicator, require};
use crate::auth;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{Catalog, Indicator, Measurement, MeasurementInput, User};
use crate::state::AppState;
use crate::validation;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/indicators/{catalog}/{id}/values",
            get(list_values).post(record_value),
        )
        .route(
            "/api/values/{catalog}/{id}",
            put(update_value).delete(delete_value),
        )
}

fn check_measurement(
    indicator: &Indicator,
    input: &MeasurementInput,
    today: NaiveDate,
) -> ApiResult<()> {
    let violations = validation::validate_measurement(indicator, input, today);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ApiError::invalid(&violations))
    }
}

/// Loads a stored value together with its indicator and checks that `user`
/// may change it.
async fn writable_value(
    state: &AppState,
    user: &User,
    catalog: Catalog,
    id: Uuid,
) -> ApiResult<(Measurement, Indicator)> {
    let measurement = db::values::get_measurement(&state.pool, catalog, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{catalog} value {id}")))?;
    let indicator = load_indicator(state, catalog, measurement.indicator_id).await?;
    require(
        auth::can_record_values(user, indicator.project_id),
        "change values of this project",
    )?;
    Ok((measurement, indicator))
}

/// GET /api/indicators/{catalog}/{id}/values
async fn list_values(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    PathParams((catalog, id)): PathParams<(Catalog, Uuid)>,
) -> ApiResult<Json<Vec<Measurement>>> {
    let indicator = load_indicator(&state, catalog, id).await?;
    require(
        auth::can_view_project(&user, indicator.project_id),
        "view this indicator",
    )?;
    Ok(Json(
        db::values::list_measurements(&state.pool, &indicator).await?,
    ))
}

/// POST /api/indicators/{catalog}/{id}/values
///
/// Replaces the value already stored under the same phase, period or date;
/// answers 201 for a new value and 200 for a replacement.
async fn record_value(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    PathParams((catalog, id)): PathParams<(Catalog, Uuid)>,
    JsonBody(input): JsonBody<MeasurementInput>,
) -> ApiResult<(StatusCode, Json<Measurement>)> {
    let indicator = load_indicator(&state, catalog, id).await?;
    require(
        auth::can_record_values(&user, indicator.project_id),
        "record values for this project",
    )?;
    check_measurement(&indicator, &input, state.config.today())?;

    let (measurement, inserted) =
        db::values::upsert_measurement(&state.pool, &indicator, &input, Some(user.id)).await?;
    tracing::info!(
        %catalog,
        code = %indicator.code,
        value_id = %measurement.id,
        inserted,
        by = %user.id,
        "value recorded"
    );
    let status = if inserted {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(measurement)))
}

/// PUT /api/values/{catalog}/{id}
async fn update_value(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    PathParams((catalog, id)): PathParams<(Catalog, Uuid)>,
    JsonBody(input): JsonBody<MeasurementInput>,
) -> ApiResult<Json<Measurement>> {
    let (_, indicator) = writable_value(&state, &user, catalog, id).await?;
    check_measurement(&indicator, &input, state.config.today())?;

    let measurement =
        db::values::update_measurement(&state.pool, catalog, id, &input, Some(user.id))
            .await?
            .ok_or_else(|| ApiError::not_found(format!("{catalog} value {id}")))?;
    tracing::info!(%catalog, value_id = %id, by = %user.id, "value updated");
    Ok(Json(measurement))
}

/// DELETE /api/values/{catalog}/{id}
async fn delete_value(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    PathParams((catalog, id)): PathParams<(Catalog, Uuid)>,
) -> ApiResult<StatusCode> {
    writable_value(&state, &user, catalog, id).await?;
    if !db::values::delete_measurement(&state.pool, catalog, id).await? {
        return Err(ApiError::not_found(format!("{catalog} value {id}")));
    }
    tracing::info!(%catalog, value_id = %id, by = %user.id, "value deleted");
    Ok(StatusCode::NO_CONTENT)
}
