use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgExecutor, PgPool, Row};
use uuid::Uuid;

use crate::catalog;
use crate::models::{Catalog, Indicator, IndicatorShape, NewIndicator};

const BASE_COLUMNS: &str = "id, project_id, code, name, description, unit, min_value, max_value";

fn extra_column(catalog: Catalog) -> Option<&'static str> {
    match catalog {
        Catalog::General => None,
        Catalog::Strategic => Some("answer_kind"),
        Catalog::Tracking => Some("periodicity"),
    }
}

fn extra_value(shape: &IndicatorShape) -> Option<&'static str> {
    match shape {
        IndicatorShape::General => None,
        IndicatorShape::Strategic { answer_kind } => Some(answer_kind.as_str()),
        IndicatorShape::Tracking { periodicity } => Some(periodicity.as_str()),
    }
}

fn columns(catalog: Catalog) -> String {
    match extra_column(catalog) {
        Some(extra) => format!("{BASE_COLUMNS}, {extra}"),
        None => BASE_COLUMNS.to_string(),
    }
}

fn indicator_from_row(catalog: Catalog, row: &PgRow) -> anyhow::Result<Indicator> {
    let shape = match catalog {
        Catalog::General => IndicatorShape::General,
        Catalog::Strategic => IndicatorShape::Strategic {
            answer_kind: row.try_get::<String, _>("answer_kind")?.parse()?,
        },
        Catalog::Tracking => IndicatorShape::Tracking {
            periodicity: row.try_get::<String, _>("periodicity")?.parse()?,
        },
    };
    let unit: String = row.try_get("unit")?;

    Ok(Indicator {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        unit: unit.parse()?,
        min_value: row.try_get("min_value")?,
        max_value: row.try_get("max_value")?,
        shape,
    })
}

/// Inserts a definition; with `skip_existing` a clashing code yields `None`
/// instead of a unique violation.
async fn insert_indicator<'e, E>(
    executor: E,
    project_id: Uuid,
    input: &NewIndicator,
    skip_existing: bool,
) -> anyhow::Result<Option<Indicator>>
where
    E: PgExecutor<'e>,
{
    let catalog = input.shape.catalog();
    let extra = extra_value(&input.shape);
    let (extra_col, extra_param) = match extra_column(catalog) {
        Some(col) => (format!(", {col}"), ", $9"),
        None => (String::new(), ""),
    };
    let conflict = if skip_existing {
        "ON CONFLICT (project_id, code) DO NOTHING"
    } else {
        ""
    };

    let sql = format!(
        r#"
        INSERT INTO {table} ({BASE_COLUMNS}{extra_col})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8{extra_param})
        {conflict}
        RETURNING {columns}
        "#,
        table = catalog.indicator_table(),
        columns = columns(catalog),
    );

    let mut query = sqlx::query(&sql)
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(input.code.trim())
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.unit.as_str())
        .bind(input.min_value)
        .bind(input.max_value);
    if let Some(value) = extra {
        query = query.bind(value);
    }

    let row = query.fetch_optional(executor).await?;
    row.as_ref()
        .map(|r| indicator_from_row(catalog, r))
        .transpose()
}

pub async fn create_indicator(
    pool: &PgPool,
    project_id: Uuid,
    input: &NewIndicator,
) -> anyhow::Result<Indicator> {
    insert_indicator(pool, project_id, input, false)
        .await?
        .ok_or_else(|| anyhow::anyhow!("insert of {} returned no row", input.code))
}

/// Copies the default catalog into a project, leaving existing codes alone.
/// Returns how many indicators were added.
pub async fn apply_template(conn: &mut PgConnection, project_id: Uuid) -> anyhow::Result<usize> {
    let mut added = 0usize;
    for definition in catalog::default_template() {
        if insert_indicator(&mut *conn, project_id, &definition, true)
            .await?
            .is_some()
        {
            added += 1;
        }
    }
    Ok(added)
}

pub async fn list_indicators(
    pool: &PgPool,
    project_id: Uuid,
    catalog: Option<Catalog>,
) -> anyhow::Result<Vec<Indicator>> {
    let catalogs: Vec<Catalog> = match catalog {
        Some(c) => vec![c],
        None => Catalog::ALL.to_vec(),
    };

    let mut indicators = Vec::new();
    for catalog in catalogs {
        let rows = sqlx::query(&format!(
            "SELECT {columns} FROM {table} WHERE project_id = $1 ORDER BY code",
            columns = columns(catalog),
            table = catalog.indicator_table(),
        ))
        .bind(project_id)
        .fetch_all(pool)
        .await?;

        for row in rows.iter() {
            indicators.push(indicator_from_row(catalog, row)?);
        }
    }

    Ok(indicators)
}

pub async fn get_indicator(
    pool: &PgPool,
    catalog: Catalog,
    id: Uuid,
) -> anyhow::Result<Option<Indicator>> {
    let row = sqlx::query(&format!(
        "SELECT {columns} FROM {table} WHERE id = $1",
        columns = columns(catalog),
        table = catalog.indicator_table(),
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref()
        .map(|r| indicator_from_row(catalog, r))
        .transpose()
}

/// Rewrites a definition in place. The catalog of `input` must be `catalog`;
/// indicators cannot move between catalogs.
pub async fn update_indicator(
    pool: &PgPool,
    catalog: Catalog,
    id: Uuid,
    input: &NewIndicator,
) -> anyhow::Result<Option<Indicator>> {
    anyhow::ensure!(
        input.shape.catalog() == catalog,
        "indicator cannot move from {catalog} to {}",
        input.shape.catalog()
    );

    let extra = extra_value(&input.shape);
    let extra_set = match extra_column(catalog) {
        Some(col) => format!(", {col} = $8"),
        None => String::new(),
    };
    let sql = format!(
        r#"
        UPDATE {table}
        SET code = $2, name = $3, description = $4, unit = $5, min_value = $6,
            max_value = $7{extra_set}
        WHERE id = $1
        RETURNING {columns}
        "#,
        table = catalog.indicator_table(),
        columns = columns(catalog),
    );

    let mut query = sqlx::query(&sql)
        .bind(id)
        .bind(input.code.trim())
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.unit.as_str())
        .bind(input.min_value)
        .bind(input.max_value);
    if let Some(value) = extra {
        query = query.bind(value);
    }

    let row = query.fetch_optional(pool).await?;
    row.as_ref()
        .map(|r| indicator_from_row(catalog, r))
        .transpose()
}

pub async fn delete_indicator(pool: &PgPool, catalog: Catalog, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query(&format!(
        "DELETE FROM {table} WHERE id = $1",
        table = catalog.indicator_table()
    ))
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
