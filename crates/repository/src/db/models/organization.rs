//! Organization row: the whole aggregate kept as one JSONB document.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::domain::Organization;

#[derive(Debug, Clone, FromRow)]
pub struct OrganizationRow {
    /// Organization name (primary key)
    pub name: String,

    /// Serialized aggregate
    pub document: Json<Organization>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl OrganizationRow {
    pub fn into_organization(self) -> Organization {
        self.document.0
    }
}
