//! Organization domain model and its access-control rules.

pub mod error;
pub mod organization;

pub use error::DomainError;
pub use organization::{DocumentRecord, Organization, Role, Subject, MANAGERS_ROLE};
