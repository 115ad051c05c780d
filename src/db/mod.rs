//! Postgres access. Every query targets the `renaturalization` schema and
//! binds its parameters; table names come from `Catalog` only.

pub mod indicators;
pub mod projects;
pub mod users;
pub mod values;

use anyhow::Context;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;

const UNIQUE_VIOLATION: &str = "23505";

pub async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to run migrations")?;
    Ok(())
}

/// Describes the constraint when `err` wraps a unique violation.
pub fn unique_violation(err: &anyhow::Error) -> Option<String> {
    let db_err = err
        .chain()
        .find_map(|e| e.downcast_ref::<sqlx::Error>())?
        .as_database_error()?;
    if db_err.code().as_deref() != Some(UNIQUE_VIOLATION) {
        return None;
    }
    Some(match db_err.constraint() {
        Some(constraint) => format!("a record with the same key already exists ({constraint})"),
        None => "a record with the same key already exists".to_string(),
    })
}
