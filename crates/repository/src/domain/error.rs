//! Violations of organization rules.

use sio_core::protocol::Permission;
use thiserror::Error;

/// Errors raised by the organization aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Subject '{0}' not found")]
    SubjectNotFound(String),

    #[error("Role '{0}' not found")]
    RoleNotFound(String),

    #[error("Document '{0}' not found")]
    DocumentNotFound(String),

    #[error("Subject '{0}' already exists")]
    SubjectExists(String),

    #[error("Role '{0}' already exists")]
    RoleExists(String),

    #[error("Document '{0}' already exists")]
    DocumentExists(String),

    #[error("User is not active")]
    InactiveSubject(String),

    #[error("Permission {0} is required")]
    PermissionDenied(Permission),

    #[error("User does not have the role in the organization")]
    RoleNotHeld(String),

    #[error("{0}")]
    Invariant(String),

    #[error("{0}")]
    Invalid(String),
}
