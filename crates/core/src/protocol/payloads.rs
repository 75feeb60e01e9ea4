//! Request and response bodies for the repository API.
//!
//! Anonymous endpoints carry these inside a [`super::SignedMessage`] or as
//! plain JSON; session endpoints carry them inside a
//! [`super::SessionEnvelope`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::permission::{AclOperation, ActivationState, DateFilter, Permission};

// ---------------------------------------------------------------------------
// Anonymous API
// ---------------------------------------------------------------------------

/// `POST /api/v1/auth/organization` body, echoed back signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrganization {
    pub organization: String,
    pub username: String,
    pub name: String,
    pub email: String,
    /// SPKI PEM of the first subject's public key.
    pub public_key: String,
}

/// Signed by the subject when opening a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandshake {
    pub organization: String,
    pub username: String,
    pub client_ephemeral_public_key: String,
}

/// Signed by the repository in answer to a [`SessionHandshake`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionGrant {
    pub session_id: String,
    pub organization: String,
    pub username: String,
    pub server_ephemeral_public_key: String,
    pub expires_at: DateTime<Utc>,
}

/// `GET /api/v1/files/` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRequest {
    pub file_handle: String,
}

/// Signed file download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub file_handle: String,
    /// Base64 of the stored `nonce || ciphertext` blob.
    pub file_content: String,
}

/// Entry of `GET /api/v1/organizations/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationSummary {
    pub name: String,
}

// ---------------------------------------------------------------------------
// Session API
// ---------------------------------------------------------------------------

/// Generic `{"state": "..."}` acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub state: String,
}

impl StatusMessage {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
        }
    }
}

/// `{"error": "..."}` carried inside an envelope when a request is refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleListing {
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectQuery {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernameRequest {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectStateChange {
    pub username: String,
    pub state: ActivationState,
}

/// `POST /api/v1/organizations/subjects` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubject {
    pub username: String,
    pub name: String,
    pub email: String,
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub permission: Permission,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermissionChange {
    pub role: String,
    pub permission: Permission,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSubjectChange {
    pub role: String,
    pub username: String,
}

/// Filters for `GET /api/v1/organizations/documents`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentQuery {
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub date_filter: Option<DateFilter>,
    /// Date in `DD-MM-YYYY` form.
    #[serde(default)]
    pub date_str: Option<String>,
}

/// One row of a document listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_name: String,
    pub document_handle: String,
    pub creator: String,
    pub create_date: DateTime<Utc>,
    pub file_handle: Option<String>,
    pub deleter: Option<String>,
}

/// `POST /api/v1/organizations/documents` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    /// Base64 of `nonce || ciphertext`.
    pub encryption_file: String,
    /// SHA-256 hex of the plaintext.
    pub file_handle: String,
    pub name: String,
    /// Hex-encoded file key.
    pub key: String,
    pub alg: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub document_name: String,
}

/// Full document metadata, including the file key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub document_name: String,
    pub document_handle: String,
    pub creator: String,
    pub create_date: DateTime<Utc>,
    pub file_handle: Option<String>,
    pub deleter: Option<String>,
    pub alg: String,
    pub key: String,
    pub acl: BTreeMap<String, BTreeSet<Permission>>,
}

/// Answer to a document deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedFile {
    pub file_handle: String,
}

/// `POST /api/v1/organizations/documents/acl` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclChange {
    pub document_name: String,
    pub operation: AclOperation,
    pub role: String,
    pub permission: Permission,
}
