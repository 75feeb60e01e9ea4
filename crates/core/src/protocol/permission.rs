//! Permission, state and filter vocabulary shared by server and client.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Rights that can be held by a role.
///
/// Organization permissions are attached to roles directly. Document
/// permissions live in each document's ACL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    RoleNew,
    RoleDown,
    RoleUp,
    RoleMod,
    RoleAcl,
    SubjectNew,
    SubjectDown,
    SubjectUp,
    DocNew,
    DocAcl,
    DocRead,
    DocDelete,
}

impl Permission {
    /// Every organization-level permission.
    pub const ORGANIZATION: [Permission; 9] = [
        Permission::RoleNew,
        Permission::RoleDown,
        Permission::RoleUp,
        Permission::RoleMod,
        Permission::RoleAcl,
        Permission::SubjectNew,
        Permission::SubjectDown,
        Permission::SubjectUp,
        Permission::DocNew,
    ];

    /// Every document-level permission.
    pub const DOCUMENT: [Permission; 3] = [
        Permission::DocAcl,
        Permission::DocRead,
        Permission::DocDelete,
    ];

    /// Whether this permission belongs in a document ACL.
    pub fn is_document_permission(self) -> bool {
        Self::DOCUMENT.contains(&self)
    }

    /// Wire name, e.g. `ROLE_NEW`.
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::RoleNew => "ROLE_NEW",
            Permission::RoleDown => "ROLE_DOWN",
            Permission::RoleUp => "ROLE_UP",
            Permission::RoleMod => "ROLE_MOD",
            Permission::RoleAcl => "ROLE_ACL",
            Permission::SubjectNew => "SUBJECT_NEW",
            Permission::SubjectDown => "SUBJECT_DOWN",
            Permission::SubjectUp => "SUBJECT_UP",
            Permission::DocNew => "DOC_NEW",
            Permission::DocAcl => "DOC_ACL",
            Permission::DocRead => "DOC_READ",
            Permission::DocDelete => "DOC_DELETE",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ORGANIZATION
            .iter()
            .chain(Self::DOCUMENT.iter())
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| CoreError::UnknownValue(s.to_string()))
    }
}

/// Lifecycle state of a subject or a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationState {
    Active,
    Suspended,
}

/// State of a subject within an organization.
pub type SubjectState = ActivationState;

/// State of a role within an organization.
pub type RoleState = ActivationState;

impl ActivationState {
    pub fn is_active(self) -> bool {
        self == ActivationState::Active
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivationState::Active => "active",
            ActivationState::Suspended => "suspended",
        }
    }
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Date comparison used when listing documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateFilter {
    #[serde(rename = "nt")]
    NewerThan,
    #[serde(rename = "ot")]
    OlderThan,
    #[serde(rename = "et")]
    EqualTo,
}

impl FromStr for DateFilter {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nt" => Ok(DateFilter::NewerThan),
            "ot" => Ok(DateFilter::OlderThan),
            "et" => Ok(DateFilter::EqualTo),
            other => Err(CoreError::UnknownValue(other.to_string())),
        }
    }
}

/// Date format used by document listing filters.
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// Whether an ACL change adds or removes a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AclOperation {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Remove,
}

impl FromStr for AclOperation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(AclOperation::Add),
            "-" => Ok(AclOperation::Remove),
            other => Err(CoreError::UnknownValue(other.to_string())),
        }
    }
}
