//! Organization storage.
//!
//! Each organization is one aggregate. Readers get a snapshot; writers go
//! through [`OrganizationStore::update`], which applies a mutation atomically
//! and persists only when the mutation succeeds.

mod memory;
mod mongo;
mod postgres;

pub use memory::MemoryOrganizationStore;
pub use mongo::MongoOrganizationStore;
pub use postgres::PgOrganizationStore;

use async_trait::async_trait;

use crate::domain::Organization;
use crate::error::AppResult;

/// Mutation applied to an organization inside [`OrganizationStore::update`].
pub type Mutation<'a> = &'a mut (dyn FnMut(&mut Organization) -> AppResult<()> + Send);

#[async_trait]
pub trait OrganizationStore: Send + Sync {
    /// Short backend name for health reports.
    fn backend(&self) -> &'static str;

    /// Store a new organization. Fails with `Conflict` if the name is taken.
    async fn insert(&self, organization: Organization) -> AppResult<()>;

    async fn get(&self, name: &str) -> AppResult<Option<Organization>>;

    /// Names of all organizations, sorted.
    async fn list(&self) -> AppResult<Vec<String>>;

    /// Apply `mutation` atomically. Fails with `NotFound` if the organization
    /// does not exist; a failed mutation leaves the stored state untouched.
    /// Optimistic backends may run the mutation again after losing a race.
    async fn update(&self, name: &str, mutation: Mutation<'_>) -> AppResult<()>;

    async fn health(&self) -> bool;
}

pub(crate) fn organization_not_found(name: &str) -> crate::error::AppError {
    crate::error::AppError::NotFound(format!("Organization '{}' not found", name))
}
