//! Organization queries.
//!
//! Lookups take any executor so they can run inside the transaction that
//! guards a read-modify-write.

use sqlx::types::Json;
use sqlx::PgExecutor;

use crate::db::models::OrganizationRow;
use crate::domain::Organization;
use crate::error::AppResult;

/// Insert a new organization. Returns `false` if the name is taken.
pub async fn insert_organization<'e, E: PgExecutor<'e>>(
    executor: E,
    organization: &Organization,
) -> AppResult<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO repository.organizations (name, document, created_at, updated_at)
        VALUES ($1, $2, $3, $3)
        ON CONFLICT (name) DO NOTHING
        "#,
    )
    .bind(&organization.name)
    .bind(Json(organization))
    .bind(organization.created_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Get an organization by name.
pub async fn get_organization<'e, E: PgExecutor<'e>>(
    executor: E,
    name: &str,
) -> AppResult<Option<OrganizationRow>> {
    let row = sqlx::query_as::<_, OrganizationRow>(
        r#"
        SELECT name, document, created_at, updated_at
        FROM repository.organizations
        WHERE name = $1
        "#,
    )
    .bind(name)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

/// Get an organization by name and lock its row until the transaction ends.
pub async fn get_organization_for_update<'e, E: PgExecutor<'e>>(
    executor: E,
    name: &str,
) -> AppResult<Option<OrganizationRow>> {
    let row = sqlx::query_as::<_, OrganizationRow>(
        r#"
        SELECT name, document, created_at, updated_at
        FROM repository.organizations
        WHERE name = $1
        FOR UPDATE
        "#,
    )
    .bind(name)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

/// List organization names in alphabetical order.
pub async fn list_organization_names<'e, E: PgExecutor<'e>>(executor: E) -> AppResult<Vec<String>> {
    let names: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM repository.organizations ORDER BY name")
            .fetch_all(executor)
            .await?;

    Ok(names.into_iter().map(|(name,)| name).collect())
}

/// Replace the stored aggregate of an organization.
pub async fn update_organization<'e, E: PgExecutor<'e>>(
    executor: E,
    organization: &Organization,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE repository.organizations
        SET document = $2, updated_at = NOW()
        WHERE name = $1
        "#,
    )
    .bind(&organization.name)
    .bind(Json(organization))
    .execute(executor)
    .await?;

    Ok(())
}
