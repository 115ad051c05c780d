use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    Answer, Catalog, Indicator, Measurement, MeasurementInput, ProjectMeasurement, Reading,
};

const COMMON_COLUMNS: &str =
    "v.id, v.indicator_id, v.measured_on, v.notes, v.recorded_by, v.updated_at";

fn reading_columns(catalog: Catalog) -> &'static str {
    match catalog {
        Catalog::General => "v.phase, v.value",
        Catalog::Strategic => "v.bool_value, v.numeric_value",
        Catalog::Tracking => "v.period, v.value",
    }
}

fn reading_from_row(catalog: Catalog, row: &PgRow) -> anyhow::Result<Reading> {
    Ok(match catalog {
        Catalog::General => Reading::General {
            phase: row.try_get::<String, _>("phase")?.parse()?,
            value: row.try_get("value")?,
        },
        Catalog::Strategic => {
            let flag: Option<bool> = row.try_get("bool_value")?;
            let number: Option<f64> = row.try_get("numeric_value")?;
            let answer = match (flag, number) {
                (Some(b), _) => Answer::Flag(b),
                (None, Some(n)) => Answer::Number(n),
                (None, None) => anyhow::bail!("strategic value row without an answer"),
            };
            Reading::Strategic { answer }
        }
        Catalog::Tracking => Reading::Tracking {
            period: row.try_get("period")?,
            value: row.try_get("value")?,
        },
    })
}

fn measurement_from_row(catalog: Catalog, row: &PgRow) -> anyhow::Result<Measurement> {
    Ok(Measurement {
        id: row.try_get("id")?,
        indicator_id: row.try_get("indicator_id")?,
        reading: reading_from_row(catalog, row)?,
        measured_on: row.try_get("measured_on")?,
        notes: row.try_get("notes")?,
        recorded_by: row.try_get("recorded_by")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn split_answer(answer: &Answer) -> (Option<bool>, Option<f64>) {
    match answer {
        Answer::Flag(b) => (Some(*b), None),
        Answer::Number(n) => (None, Some(*n)),
    }
}

/// Inserts the reading or replaces the existing one with the same key:
/// phase for general, measurement date for strategic, period for tracking.
/// The flag is true when a new row was created.
pub async fn upsert_measurement(
    pool: &PgPool,
    indicator: &Indicator,
    input: &MeasurementInput,
    recorded_by: Option<Uuid>,
) -> anyhow::Result<(Measurement, bool)> {
    let catalog = indicator.catalog();
    anyhow::ensure!(
        input.reading.catalog() == catalog,
        "{} reading cannot be stored against {} indicator {}",
        input.reading.catalog(),
        catalog,
        indicator.code
    );
    let table = catalog.value_table();
    let id = Uuid::new_v4();
    let returning = "RETURNING id, updated_at, (xmax = 0) AS inserted";

    let row = match &input.reading {
        Reading::General { phase, value } => {
            sqlx::query(&format!(
                r#"
                INSERT INTO {table}
                (id, indicator_id, phase, value, measured_on, notes, recorded_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (indicator_id, phase) DO UPDATE
                SET value = EXCLUDED.value, measured_on = EXCLUDED.measured_on,
                    notes = EXCLUDED.notes, recorded_by = EXCLUDED.recorded_by,
                    updated_at = now()
                {returning}
                "#
            ))
            .bind(id)
            .bind(indicator.id)
            .bind(phase.as_str())
            .bind(*value)
            .bind(input.measured_on)
            .bind(input.notes.trim())
            .bind(recorded_by)
            .fetch_one(pool)
            .await?
        }
        Reading::Strategic { answer } => {
            let (flag, number) = split_answer(answer);
            sqlx::query(&format!(
                r#"
                INSERT INTO {table}
                (id, indicator_id, bool_value, numeric_value, measured_on, notes, recorded_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (indicator_id, measured_on) DO UPDATE
                SET bool_value = EXCLUDED.bool_value, numeric_value = EXCLUDED.numeric_value,
                    notes = EXCLUDED.notes, recorded_by = EXCLUDED.recorded_by,
                    updated_at = now()
                {returning}
                "#
            ))
            .bind(id)
            .bind(indicator.id)
            .bind(flag)
            .bind(number)
            .bind(input.measured_on)
            .bind(input.notes.trim())
            .bind(recorded_by)
            .fetch_one(pool)
            .await?
        }
        Reading::Tracking { period, value } => {
            sqlx::query(&format!(
                r#"
                INSERT INTO {table}
                (id, indicator_id, period, value, measured_on, notes, recorded_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (indicator_id, period) DO UPDATE
                SET value = EXCLUDED.value, measured_on = EXCLUDED.measured_on,
                    notes = EXCLUDED.notes, recorded_by = EXCLUDED.recorded_by,
                    updated_at = now()
                {returning}
                "#
            ))
            .bind(id)
            .bind(indicator.id)
            .bind(period.trim())
            .bind(*value)
            .bind(input.measured_on)
            .bind(input.notes.trim())
            .bind(recorded_by)
            .fetch_one(pool)
            .await?
        }
    };

    let inserted: bool = row.try_get("inserted")?;
    let measurement = Measurement {
        id: row.try_get("id")?,
        indicator_id: indicator.id,
        reading: normalized(&input.reading),
        measured_on: input.measured_on,
        notes: input.notes.trim().to_string(),
        recorded_by,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    };
    Ok((measurement, inserted))
}

fn normalized(reading: &Reading) -> Reading {
    match reading {
        Reading::Tracking { period, value } => Reading::Tracking {
            period: period.trim().to_string(),
            value: *value,
        },
        other => other.clone(),
    }
}

/// Rewrites a stored value by id. The reading must belong to `catalog`.
pub async fn update_measurement(
    pool: &PgPool,
    catalog: Catalog,
    id: Uuid,
    input: &MeasurementInput,
    recorded_by: Option<Uuid>,
) -> anyhow::Result<Option<Measurement>> {
    let table = catalog.value_table();
    let returning = format!("RETURNING {COMMON_COLUMNS}, {}", reading_columns(catalog));

    let row = match &input.reading {
        Reading::General { phase, value } if catalog == Catalog::General => {
            sqlx::query(&format!(
                r#"
                UPDATE {table} AS v
                SET phase = $2, value = $3, measured_on = $4, notes = $5,
                    recorded_by = $6, updated_at = now()
                WHERE v.id = $1
                {returning}
                "#
            ))
            .bind(id)
            .bind(phase.as_str())
            .bind(*value)
            .bind(input.measured_on)
            .bind(input.notes.trim())
            .bind(recorded_by)
            .fetch_optional(pool)
            .await?
        }
        Reading::Strategic { answer } if catalog == Catalog::Strategic => {
            let (flag, number) = split_answer(answer);
            sqlx::query(&format!(
                r#"
                UPDATE {table} AS v
                SET bool_value = $2, numeric_value = $3, measured_on = $4, notes = $5,
                    recorded_by = $6, updated_at = now()
                WHERE v.id = $1
                {returning}
                "#
            ))
            .bind(id)
            .bind(flag)
            .bind(number)
            .bind(input.measured_on)
            .bind(input.notes.trim())
            .bind(recorded_by)
            .fetch_optional(pool)
            .await?
        }
        Reading::Tracking { period, value } if catalog == Catalog::Tracking => {
            sqlx::query(&format!(
                r#"
                UPDATE {table} AS v
                SET period = $2, value = $3, measured_on = $4, notes = $5,
                    recorded_by = $6, updated_at = now()
                WHERE v.id = $1
                {returning}
                "#
            ))
            .bind(id)
            .bind(period.trim())
            .bind(*value)
            .bind(input.measured_on)
            .bind(input.notes.trim())
            .bind(recorded_by)
            .fetch_optional(pool)
            .await?
        }
        other => anyhow::bail!("{} reading cannot update a {catalog} value", other.catalog()),
    };

    row.as_ref()
        .map(|r| measurement_from_row(catalog, r))
        .transpose()
}

/// Whether a value is already stored under the key `input` would upsert.
pub async fn measurement_exists(
    pool: &PgPool,
    indicator: &Indicator,
    input: &MeasurementInput,
) -> anyhow::Result<bool> {
    let table = indicator.catalog().value_table();
    let sql_for = |column: &str| {
        format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE indicator_id = $1 AND {column} = $2)")
    };

    let exists: bool = match &input.reading {
        Reading::General { phase, .. } => {
            sqlx::query_scalar(&sql_for("phase"))
                .bind(indicator.id)
                .bind(phase.as_str())
                .fetch_one(pool)
                .await?
        }
        Reading::Strategic { .. } => {
            sqlx::query_scalar(&sql_for("measured_on"))
                .bind(indicator.id)
                .bind(input.measured_on)
                .fetch_one(pool)
                .await?
        }
        Reading::Tracking { period, .. } => {
            sqlx::query_scalar(&sql_for("period"))
                .bind(indicator.id)
                .bind(period.trim())
                .fetch_one(pool)
                .await?
        }
    };
    Ok(exists)
}

pub async fn get_measurement(
    pool: &PgPool,
    catalog: Catalog,
    id: Uuid,
) -> anyhow::Result<Option<Measurement>> {
    let row = sqlx::query(&format!(
        "SELECT {COMMON_COLUMNS}, {reading} FROM {table} v WHERE v.id = $1",
        reading = reading_columns(catalog),
        table = catalog.value_table(),
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref()
        .map(|r| measurement_from_row(catalog, r))
        .transpose()
}

pub async fn list_measurements(
    pool: &PgPool,
    indicator: &Indicator,
) -> anyhow::Result<Vec<Measurement>> {
    let catalog = indicator.catalog();
    let rows = sqlx::query(&format!(
        "SELECT {COMMON_COLUMNS}, {reading} FROM {table} v \
         WHERE v.indicator_id = $1 ORDER BY v.measured_on, v.updated_at",
        reading = reading_columns(catalog),
        table = catalog.value_table(),
    ))
    .bind(indicator.id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|r| measurement_from_row(catalog, r))
        .collect()
}

pub async fn delete_measurement(pool: &PgPool, catalog: Catalog, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query(&format!(
        "DELETE FROM {table} WHERE id = $1",
        table = catalog.value_table()
    ))
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Every value of a project across the three catalogs, with the code, name
/// and unit of its indicator.
pub async fn list_project_measurements(
    pool: &PgPool,
    project_id: Uuid,
) -> anyhow::Result<Vec<ProjectMeasurement>> {
    let mut measurements = Vec::new();

    for catalog in Catalog::ALL.iter().copied() {
        let rows = sqlx::query(&format!(
            r#"
            SELECT i.code, i.name, i.unit, {COMMON_COLUMNS}, {reading}
            FROM {values} v
            JOIN {indicators} i ON i.id = v.indicator_id
            WHERE i.project_id = $1
            ORDER BY i.code, v.measured_on
            "#,
            reading = reading_columns(catalog),
            values = catalog.value_table(),
            indicators = catalog.indicator_table(),
        ))
        .bind(project_id)
        .fetch_all(pool)
        .await
        .with_context(|| format!("failed to load {catalog} values"))?;

        for row in rows.iter() {
            let unit: String = row.try_get("unit")?;
            measurements.push(ProjectMeasurement {
                code: row.try_get("code")?,
                name: row.try_get("name")?,
                unit: unit.parse()?,
                measurement: measurement_from_row(catalog, row)?,
            });
        }
    }

    Ok(measurements)
}
