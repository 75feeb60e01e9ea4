//! Service layer for the SIO Repository.
//!
//! Services hold the organization rules together with the store, session
//! registry and file store. Handlers stay thin.

pub mod auth;
pub mod document;
pub mod file;
pub mod organization;

pub use auth::AuthService;
pub use document::DocumentService;
pub use file::FileService;
pub use organization::OrganizationService;

use crate::domain::Organization;
use crate::error::AppResult;
use crate::store::{organization_not_found, OrganizationStore};

/// Fetch an organization snapshot or fail with `NotFound`.
pub(crate) async fn load_organization(
    store: &dyn OrganizationStore,
    name: &str,
) -> AppResult<Organization> {
    store
        .get(name)
        .await?
        .ok_or_else(|| organization_not_found(name))
}
