//! Connecting to PostgreSQL and bootstrapping the `repository` schema.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::error::AppResult;

/// Shared PostgreSQL pool.
pub type DbPool = PgPool;

const SCHEMA: &[&str] = &[
    "CREATE SCHEMA IF NOT EXISTS repository",
    r#"
    CREATE TABLE IF NOT EXISTS repository.organizations (
        name TEXT PRIMARY KEY,
        document JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];

/// Open a pool for the organization store and make sure its tables exist.
pub async fn connect(config: &DatabaseConfig) -> AppResult<DbPool> {
    let options = config.connect_options()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout))
        .connect_with(options)
        .await?;

    tracing::info!(
        target = %config.target(),
        max_connections = config.max_connections,
        "Connected to organization database"
    );

    for statement in SCHEMA {
        sqlx::query(statement).execute(&pool).await?;
    }
    tracing::debug!("Repository schema ready");

    Ok(pool)
}

/// Round-trip a trivial query; used by the health endpoint.
pub async fn ping(pool: &DbPool) -> bool {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .is_ok()
}
