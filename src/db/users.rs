use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{NewUser, User};

const COLUMNS: &str = "u.id, u.email, u.name, u.role, u.project_id, u.created_at";

fn user_from_row(row: &PgRow) -> anyhow::Result<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        role: role.parse()?,
        project_id: row.try_get("project_id")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn create_user(
    pool: &PgPool,
    input: &NewUser,
    password_hash: &str,
) -> anyhow::Result<User> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO renaturalization.users AS u (id, email, name, password_hash, role, project_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(input.email.trim().to_lowercase())
    .bind(input.name.trim())
    .bind(password_hash)
    .bind(input.role.as_str())
    .bind(input.project_id)
    .fetch_one(pool)
    .await?;

    user_from_row(&row)
}

/// Seeding helper: creates the user or refreshes name, role, project and
/// password of an existing email.
pub async fn upsert_user(
    pool: &PgPool,
    input: &NewUser,
    password_hash: &str,
) -> anyhow::Result<User> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO renaturalization.users AS u (id, email, name, password_hash, role, project_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (email) DO UPDATE
        SET name = EXCLUDED.name, password_hash = EXCLUDED.password_hash,
            role = EXCLUDED.role, project_id = EXCLUDED.project_id
        RETURNING {COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(input.email.trim().to_lowercase())
    .bind(input.name.trim())
    .bind(password_hash)
    .bind(input.role.as_str())
    .bind(input.project_id)
    .fetch_one(pool)
    .await?;

    user_from_row(&row)
}

pub async fn list_users(pool: &PgPool) -> anyhow::Result<Vec<User>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM renaturalization.users u ORDER BY u.email"
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(user_from_row).collect()
}

/// The user with this email plus their stored password hash.
pub async fn find_credentials(
    pool: &PgPool,
    email: &str,
) -> anyhow::Result<Option<(User, String)>> {
    let row = sqlx::query(&format!(
        "SELECT {COLUMNS}, u.password_hash FROM renaturalization.users u WHERE u.email = $1"
    ))
    .bind(email.trim().to_lowercase())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let hash: String = row.try_get("password_hash")?;
            Ok(Some((user_from_row(&row)?, hash)))
        }
        None => Ok(None),
    }
}

pub async fn create_session(
    pool: &PgPool,
    user_id: Uuid,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO renaturalization.sessions (token_hash, user_id, expires_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(token_hash)
    .bind(user_id)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn user_for_session(pool: &PgPool, token_hash: &str) -> anyhow::Result<Option<User>> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {COLUMNS}
        FROM renaturalization.sessions s
        JOIN renaturalization.users u ON u.id = s.user_id
        WHERE s.token_hash = $1 AND s.expires_at > now()
        "#
    ))
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(user_from_row).transpose()
}

pub async fn delete_session(pool: &PgPool, token_hash: &str) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM renaturalization.sessions WHERE token_hash = $1")
        .bind(token_hash)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn purge_expired_sessions(pool: &PgPool) -> anyhow::Result<u64> {
    let result = sqlx::query("DELETE FROM renaturalization.sessions WHERE expires_at <= now()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
