//! PostgreSQL store: one JSONB row per organization.

use async_trait::async_trait;

use super::{organization_not_found, Mutation, OrganizationStore};
use crate::db::{connect::ping, queries::organization as queries, DbPool};
use crate::domain::Organization;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct PgOrganizationStore {
    pool: DbPool,
}

impl PgOrganizationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrganizationStore for PgOrganizationStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn insert(&self, organization: Organization) -> AppResult<()> {
        if !queries::insert_organization(&self.pool, &organization).await? {
            return Err(AppError::Conflict(format!(
                "Organization '{}' already exists",
                organization.name
            )));
        }
        Ok(())
    }

    async fn get(&self, name: &str) -> AppResult<Option<Organization>> {
        Ok(queries::get_organization(&self.pool, name)
            .await?
            .map(|row| row.into_organization()))
    }

    async fn list(&self) -> AppResult<Vec<String>> {
        queries::list_organization_names(&self.pool).await
    }

    async fn update(&self, name: &str, mutation: Mutation<'_>) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let mut organization = queries::get_organization_for_update(&mut *tx, name)
            .await?
            .ok_or_else(|| organization_not_found(name))?
            .into_organization();

        // Dropping the transaction on error rolls back and releases the lock.
        mutation(&mut organization)?;

        queries::update_organization(&mut *tx, &organization).await?;
        tx.commit().await?;

        tracing::debug!(organization = %name, "Organization updated");
        Ok(())
    }

    async fn health(&self) -> bool {
        ping(&self.pool).await
    }
}
