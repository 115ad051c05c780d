use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, PgPool, Row};
use uuid::Uuid;

use crate::models::{Project, ProjectInput};

const COLUMNS: &str = "id, code, name, municipality, description, created_at";

fn project_from_row(row: &PgRow) -> sqlx::Result<Project> {
    Ok(Project {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        municipality: row.try_get("municipality")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn list_projects(pool: &PgPool) -> anyhow::Result<Vec<Project>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM renaturalization.projects ORDER BY code"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(project_from_row).collect::<sqlx::Result<_>>()?)
}

pub async fn get_project(pool: &PgPool, id: Uuid) -> anyhow::Result<Option<Project>> {
    let row = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM renaturalization.projects WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(project_from_row).transpose()?)
}

pub async fn get_project_by_code(pool: &PgPool, code: &str) -> anyhow::Result<Option<Project>> {
    let row = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM renaturalization.projects WHERE code = $1"
    ))
    .bind(code.trim())
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(project_from_row).transpose()?)
}

pub async fn create_project<'e, E>(executor: E, input: &ProjectInput) -> anyhow::Result<Project>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO renaturalization.projects (id, code, name, municipality, description)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(input.code.trim())
    .bind(input.name.trim())
    .bind(input.municipality.trim())
    .bind(&input.description)
    .fetch_one(executor)
    .await?;

    Ok(project_from_row(&row)?)
}

/// Creates a project and, with `with_template`, copies the default catalog
/// into it. Either both happen or neither does.
pub async fn create_project_with_template(
    pool: &PgPool,
    input: &ProjectInput,
    with_template: bool,
) -> anyhow::Result<(Project, usize)> {
    let mut tx = pool.begin().await?;
    let project = create_project(&mut *tx, input).await?;
    let added = if with_template {
        super::indicators::apply_template(&mut tx, project.id).await?
    } else {
        0
    };
    tx.commit().await?;
    Ok((project, added))
}

pub async fn update_project(
    pool: &PgPool,
    id: Uuid,
    input: &ProjectInput,
) -> anyhow::Result<Option<Project>> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE renaturalization.projects
        SET code = $2, name = $3, municipality = $4, description = $5
        WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(input.code.trim())
    .bind(input.name.trim())
    .bind(input.municipality.trim())
    .bind(&input.description)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(project_from_row).transpose()?)
}

/// Indicators and values go with the project; users keep their account.
pub async fn delete_project(pool: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM renaturalization.projects WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
