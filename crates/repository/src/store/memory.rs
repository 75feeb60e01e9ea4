//! In-process store, used by tests and `SIO_STORE=memory`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{organization_not_found, Mutation, OrganizationStore};
use crate::domain::Organization;
use crate::error::{AppError, AppResult};

#[derive(Default)]
pub struct MemoryOrganizationStore {
    organizations: RwLock<BTreeMap<String, Organization>>,
}

impl MemoryOrganizationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrganizationStore for MemoryOrganizationStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, organization: Organization) -> AppResult<()> {
        let mut organizations = self.organizations.write().await;
        if organizations.contains_key(&organization.name) {
            return Err(AppError::Conflict(format!(
                "Organization '{}' already exists",
                organization.name
            )));
        }
        organizations.insert(organization.name.clone(), organization);
        Ok(())
    }

    async fn get(&self, name: &str) -> AppResult<Option<Organization>> {
        Ok(self.organizations.read().await.get(name).cloned())
    }

    async fn list(&self) -> AppResult<Vec<String>> {
        Ok(self.organizations.read().await.keys().cloned().collect())
    }

    async fn update(&self, name: &str, mutation: Mutation<'_>) -> AppResult<()> {
        let mut organizations = self.organizations.write().await;
        let stored = organizations
            .get_mut(name)
            .ok_or_else(|| organization_not_found(name))?;

        let mut draft = stored.clone();
        mutation(&mut draft)?;
        *stored = draft;
        Ok(())
    }

    async fn health(&self) -> bool {
        true
    }
}
