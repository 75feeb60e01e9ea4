//! Organization aggregate: subjects, roles, permissions and documents.
//!
//! An organization is loaded, mutated and stored as a whole, so every rule
//! here is checked against a consistent snapshot.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sio_core::protocol::{
    AclOperation, ActivationState, DateFilter, DocumentSummary, Permission, RoleState,
    SubjectState,
};

use super::error::DomainError;

/// Role created with every organization. It always holds every organization
/// permission and keeps at least one active subject.
pub const MANAGERS_ROLE: &str = "Managers";

type DomainResult<T> = Result<T, DomainError>;

/// A member of an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub username: String,
    pub full_name: String,
    pub email: String,
    /// SPKI PEM of the subject's password-derived public key.
    pub public_key: String,
    pub state: SubjectState,
}

impl Subject {
    pub fn new(
        username: impl Into<String>,
        full_name: impl Into<String>,
        email: impl Into<String>,
        public_key: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            full_name: full_name.into(),
            email: email.into(),
            public_key: public_key.into(),
            state: ActivationState::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub state: RoleState,
    pub permissions: BTreeSet<Permission>,
    pub subjects: BTreeSet<String>,
}

impl Role {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: ActivationState::Active,
            permissions: BTreeSet::new(),
            subjects: BTreeSet::new(),
        }
    }
}

/// Stored metadata of a document. The file key is kept sealed under the
/// repository master key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub name: String,
    pub document_handle: String,
    pub creator: String,
    pub create_date: DateTime<Utc>,
    pub file_handle: Option<String>,
    pub deleter: Option<String>,
    pub alg: String,
    pub sealed_key: String,
    pub acl: BTreeMap<String, BTreeSet<Permission>>,
}

impl DocumentRecord {
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            document_name: self.name.clone(),
            document_handle: self.document_handle.clone(),
            creator: self.creator.clone(),
            create_date: self.create_date,
            file_handle: self.file_handle.clone(),
            deleter: self.deleter.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub subjects: BTreeMap<String, Subject>,
    pub roles: BTreeMap<String, Role>,
    pub documents: BTreeMap<String, DocumentRecord>,
}

impl Organization {
    /// Create an organization whose first subject manages it.
    pub fn new(name: impl Into<String>, founder: Subject, now: DateTime<Utc>) -> Self {
        let mut managers = Role::new(MANAGERS_ROLE);
        managers.permissions.extend(Permission::ORGANIZATION);
        managers.subjects.insert(founder.username.clone());

        Self {
            name: name.into(),
            created_at: now,
            subjects: BTreeMap::from([(founder.username.clone(), founder)]),
            roles: BTreeMap::from([(MANAGERS_ROLE.to_string(), managers)]),
            documents: BTreeMap::new(),
        }
    }

    // -- Subjects ----------------------------------------------------------

    pub fn subject(&self, username: &str) -> DomainResult<&Subject> {
        self.subjects
            .get(username)
            .ok_or_else(|| DomainError::SubjectNotFound(username.to_string()))
    }

    /// Fail unless `username` exists and is active.
    pub fn ensure_active(&self, username: &str) -> DomainResult<()> {
        if self.subject(username)?.state.is_active() {
            Ok(())
        } else {
            Err(DomainError::InactiveSubject(username.to_string()))
        }
    }

    pub fn add_subject(&mut self, subject: Subject) -> DomainResult<()> {
        if subject.username.trim().is_empty() {
            return Err(DomainError::Invalid("Username must not be empty".to_string()));
        }
        if self.subjects.contains_key(&subject.username) {
            return Err(DomainError::SubjectExists(subject.username));
        }
        self.subjects.insert(subject.username.clone(), subject);
        Ok(())
    }

    pub fn set_subject_state(&mut self, username: &str, state: SubjectState) -> DomainResult<()> {
        self.subject(username)?;
        if !state.is_active() && self.is_last_active_manager(username) {
            return Err(DomainError::Invariant(format!(
                "Cannot suspend '{}': the {} role must keep an active subject",
                username, MANAGERS_ROLE
            )));
        }
        if let Some(subject) = self.subjects.get_mut(username) {
            subject.state = state;
        }
        Ok(())
    }

    /// States of all subjects, or of a single one when `username` is given.
    pub fn subject_states(
        &self,
        username: Option<&str>,
    ) -> DomainResult<BTreeMap<String, SubjectState>> {
        match username {
            Some(name) => {
                let subject = self.subject(name)?;
                Ok(BTreeMap::from([(subject.username.clone(), subject.state)]))
            }
            None => Ok(self
                .subjects
                .values()
                .map(|s| (s.username.clone(), s.state))
                .collect()),
        }
    }

    fn is_last_active_manager(&self, username: &str) -> bool {
        let Some(managers) = self.roles.get(MANAGERS_ROLE) else {
            return false;
        };
        managers.subjects.contains(username)
            && !managers.subjects.iter().any(|member| {
                member != username
                    && self
                        .subjects
                        .get(member)
                        .map(|s| s.state.is_active())
                        .unwrap_or(false)
            })
    }

    // -- Roles -------------------------------------------------------------

    pub fn role(&self, name: &str) -> DomainResult<&Role> {
        self.roles
            .get(name)
            .ok_or_else(|| DomainError::RoleNotFound(name.to_string()))
    }

    fn role_mut(&mut self, name: &str) -> DomainResult<&mut Role> {
        self.roles
            .get_mut(name)
            .ok_or_else(|| DomainError::RoleNotFound(name.to_string()))
    }

    pub fn add_role(&mut self, name: &str) -> DomainResult<()> {
        if name.trim().is_empty() {
            return Err(DomainError::Invalid("Role name must not be empty".to_string()));
        }
        if self.roles.contains_key(name) {
            return Err(DomainError::RoleExists(name.to_string()));
        }
        self.roles.insert(name.to_string(), Role::new(name));
        Ok(())
    }

    pub fn set_role_state(&mut self, name: &str, state: RoleState) -> DomainResult<()> {
        if name == MANAGERS_ROLE && !state.is_active() {
            return Err(DomainError::Invariant(format!(
                "The {} role cannot be suspended",
                MANAGERS_ROLE
            )));
        }
        self.role_mut(name)?.state = state;
        Ok(())
    }

    pub fn grant_permission(&mut self, role: &str, permission: Permission) -> DomainResult<()> {
        if permission.is_document_permission() {
            return Err(DomainError::Invalid(format!(
                "{} is a document permission; change it through the document ACL",
                permission
            )));
        }
        self.role_mut(role)?.permissions.insert(permission);
        Ok(())
    }

    pub fn revoke_permission(&mut self, role: &str, permission: Permission) -> DomainResult<()> {
        if permission.is_document_permission() {
            return Err(DomainError::Invalid(format!(
                "{} is a document permission; change it through the document ACL",
                permission
            )));
        }
        if role == MANAGERS_ROLE {
            return Err(DomainError::Invariant(format!(
                "The {} role always keeps every organization permission",
                MANAGERS_ROLE
            )));
        }
        if !self.role_mut(role)?.permissions.remove(&permission) {
            return Err(DomainError::Invalid(format!(
                "Role '{}' does not have permission {}",
                role, permission
            )));
        }
        Ok(())
    }

    pub fn add_role_subject(&mut self, role: &str, username: &str) -> DomainResult<()> {
        self.subject(username)?;
        if !self.role_mut(role)?.subjects.insert(username.to_string()) {
            return Err(DomainError::Invalid(format!(
                "Subject '{}' already has role '{}'",
                username, role
            )));
        }
        Ok(())
    }

    pub fn remove_role_subject(&mut self, role: &str, username: &str) -> DomainResult<()> {
        if !self.role(role)?.subjects.contains(username) {
            return Err(DomainError::Invalid(format!(
                "Subject '{}' does not have role '{}'",
                username, role
            )));
        }
        if role == MANAGERS_ROLE && self.is_last_active_manager(username) {
            return Err(DomainError::Invariant(format!(
                "The {} role must keep an active subject",
                MANAGERS_ROLE
            )));
        }
        self.role_mut(role)?.subjects.remove(username);
        Ok(())
    }

    /// Members of a role with their subject state.
    pub fn role_subjects(&self, role: &str) -> DomainResult<BTreeMap<String, SubjectState>> {
        Ok(self
            .role(role)?
            .subjects
            .iter()
            .filter_map(|u| self.subjects.get(u).map(|s| (u.clone(), s.state)))
            .collect())
    }

    /// Roles held by a subject with their role state.
    pub fn subject_roles(&self, username: &str) -> DomainResult<BTreeMap<String, RoleState>> {
        self.subject(username)?;
        Ok(self
            .roles
            .values()
            .filter(|r| r.subjects.contains(username))
            .map(|r| (r.name.clone(), r.state))
            .collect())
    }

    /// Permissions of a role: `"organization"` for organization permissions,
    /// or the list of documents whose ACL grants it.
    pub fn role_permissions(&self, role: &str) -> DomainResult<BTreeMap<String, Value>> {
        let mut listing: BTreeMap<String, Value> = self
            .role(role)?
            .permissions
            .iter()
            .map(|p| (p.to_string(), json!("organization")))
            .collect();

        for permission in Permission::DOCUMENT {
            let documents: Vec<&str> = self
                .documents
                .values()
                .filter(|d| d.acl.get(role).is_some_and(|set| set.contains(&permission)))
                .map(|d| d.name.as_str())
                .collect();
            if !documents.is_empty() {
                listing.insert(permission.to_string(), json!(documents));
            }
        }

        Ok(listing)
    }

    /// Roles holding a permission: their state for organization permissions,
    /// or the documents whose ACL grants it for document permissions.
    pub fn permission_roles(&self, permission: Permission) -> BTreeMap<String, Value> {
        if permission.is_document_permission() {
            let mut listing: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for document in self.documents.values() {
                for (role, permissions) in &document.acl {
                    if permissions.contains(&permission) {
                        listing
                            .entry(role.clone())
                            .or_default()
                            .push(document.name.clone());
                    }
                }
            }
            listing.into_iter().map(|(r, d)| (r, json!(d))).collect()
        } else {
            self.roles
                .values()
                .filter(|r| r.permissions.contains(&permission))
                .map(|r| (r.name.clone(), json!(r.state)))
                .collect()
        }
    }

    /// Fail unless `username` may assume `role` now.
    pub fn ensure_can_assume(&self, username: &str, role: &str) -> DomainResult<()> {
        let found = self
            .roles
            .get(role)
            .ok_or_else(|| DomainError::RoleNotHeld(role.to_string()))?;
        if !found.subjects.contains(username) {
            return Err(DomainError::RoleNotHeld(role.to_string()));
        }
        if !found.state.is_active() {
            return Err(DomainError::Invalid(format!("Role '{}' is suspended", role)));
        }
        Ok(())
    }

    fn active_roles<'a>(&'a self, roles: &'a [String]) -> impl Iterator<Item = &'a Role> + 'a {
        roles
            .iter()
            .filter_map(|name| self.roles.get(name))
            .filter(|role| role.state.is_active())
    }

    /// Fail unless one of the active `roles` holds the organization permission.
    pub fn ensure_permission(&self, roles: &[String], permission: Permission) -> DomainResult<()> {
        if self
            .active_roles(roles)
            .any(|role| role.permissions.contains(&permission))
        {
            Ok(())
        } else {
            Err(DomainError::PermissionDenied(permission))
        }
    }

    /// Fail unless one of the active `roles` holds the permission in the
    /// document's ACL.
    pub fn ensure_document_permission(
        &self,
        roles: &[String],
        document: &str,
        permission: Permission,
    ) -> DomainResult<&DocumentRecord> {
        let record = self.document(document)?;
        if self.active_roles(roles).any(|role| {
            record
                .acl
                .get(&role.name)
                .is_some_and(|set| set.contains(&permission))
        }) {
            Ok(record)
        } else {
            Err(DomainError::PermissionDenied(permission))
        }
    }

    // -- Documents ---------------------------------------------------------

    pub fn document(&self, name: &str) -> DomainResult<&DocumentRecord> {
        self.documents
            .get(name)
            .ok_or_else(|| DomainError::DocumentNotFound(name.to_string()))
    }

    /// Register a document; `Managers` receives every document permission.
    pub fn add_document(&mut self, mut record: DocumentRecord) -> DomainResult<()> {
        if record.name.trim().is_empty() {
            return Err(DomainError::Invalid("Document name must not be empty".to_string()));
        }
        if self.documents.contains_key(&record.name) {
            return Err(DomainError::DocumentExists(record.name));
        }
        record
            .acl
            .entry(MANAGERS_ROLE.to_string())
            .or_default()
            .extend(Permission::DOCUMENT);
        self.documents.insert(record.name.clone(), record);
        Ok(())
    }

    pub fn list_documents(
        &self,
        creator: Option<&str>,
        date: Option<(DateFilter, NaiveDate)>,
    ) -> Vec<DocumentSummary> {
        self.documents
            .values()
            .filter(|d| creator.map_or(true, |c| d.creator == c))
            .filter(|d| {
                date.map_or(true, |(filter, day)| {
                    let created = d.create_date.date_naive();
                    match filter {
                        DateFilter::NewerThan => created > day,
                        DateFilter::OlderThan => created < day,
                        DateFilter::EqualTo => created == day,
                    }
                })
            })
            .map(DocumentRecord::summary)
            .collect()
    }

    /// Clear a document's file handle and return the handle that was removed.
    pub fn delete_document(&mut self, name: &str, deleter: &str) -> DomainResult<String> {
        let record = self
            .documents
            .get_mut(name)
            .ok_or_else(|| DomainError::DocumentNotFound(name.to_string()))?;
        let handle = record.file_handle.take().ok_or_else(|| {
            DomainError::DocumentNotFound(format!("{} (file already deleted)", name))
        })?;
        record.deleter = Some(deleter.to_string());
        Ok(handle)
    }

    pub fn change_acl(
        &mut self,
        document: &str,
        operation: AclOperation,
        role: &str,
        permission: Permission,
    ) -> DomainResult<()> {
        if !permission.is_document_permission() {
            return Err(DomainError::Invalid(format!(
                "{} is not a document permission",
                permission
            )));
        }
        self.role(role)?;
        let record = self
            .documents
            .get_mut(document)
            .ok_or_else(|| DomainError::DocumentNotFound(document.to_string()))?;

        match operation {
            AclOperation::Add => {
                record
                    .acl
                    .entry(role.to_string())
                    .or_default()
                    .insert(permission);
            }
            AclOperation::Remove => {
                let removed = record
                    .acl
                    .get_mut(role)
                    .is_some_and(|set| set.remove(&permission));
                if !removed {
                    return Err(DomainError::Invalid(format!(
                        "Role '{}' does not have {} on '{}'",
                        role, permission, document
                    )));
                }
                if permission == Permission::DocAcl
                    && !record
                        .acl
                        .values()
                        .any(|set| set.contains(&Permission::DocAcl))
                {
                    record
                        .acl
                        .entry(role.to_string())
                        .or_default()
                        .insert(Permission::DocAcl);
                    return Err(DomainError::Invariant(format!(
                        "Document '{}' must keep a role with DOC_ACL",
                        document
                    )));
                }
                record.acl.retain(|_, set| !set.is_empty());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn subject(name: &str) -> Subject {
        Subject::new(name, format!("{} Full", name), format!("{}@example.com", name), "pem")
    }

    fn org() -> Organization {
        Organization::new("acme", subject("alice"), Utc::now())
    }

    fn document(name: &str, creator: &str, day: u32) -> DocumentRecord {
        DocumentRecord {
            name: name.to_string(),
            document_handle: sio_core::crypto::document_handle("acme", name),
            creator: creator.to_string(),
            create_date: Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap(),
            file_handle: Some(format!("{:064x}", day)),
            deleter: None,
            alg: "AES-GCM".to_string(),
            sealed_key: "sealed".to_string(),
            acl: BTreeMap::new(),
        }
    }

    fn managers() -> Vec<String> {
        vec![MANAGERS_ROLE.to_string()]
    }

    #[test]
    fn test_new_organization_has_managers() {
        let org = org();
        let managers = org.role(MANAGERS_ROLE).unwrap();
        assert!(managers.subjects.contains("alice"));
        assert_eq!(managers.permissions.len(), Permission::ORGANIZATION.len());
        assert!(org.ensure_permission(&self::managers(), Permission::SubjectNew).is_ok());
    }

    #[test]
    fn test_duplicate_subject_and_role() {
        let mut org = org();
        assert_eq!(
            org.add_subject(subject("alice")),
            Err(DomainError::SubjectExists("alice".to_string()))
        );
        org.add_role("Auditors").unwrap();
        assert!(matches!(org.add_role("Auditors"), Err(DomainError::RoleExists(_))));
    }

    #[test]
    fn test_last_active_manager_cannot_be_suspended() {
        let mut org = org();
        assert!(matches!(
            org.set_subject_state("alice", ActivationState::Suspended),
            Err(DomainError::Invariant(_))
        ));

        org.add_subject(subject("bob")).unwrap();
        org.add_role_subject(MANAGERS_ROLE, "bob").unwrap();
        org.set_subject_state("alice", ActivationState::Suspended).unwrap();

        // bob is now the only active manager
        assert!(org.remove_role_subject(MANAGERS_ROLE, "bob").is_err());
        assert!(org.remove_role_subject(MANAGERS_ROLE, "alice").is_ok());
    }

    #[test]
    fn test_managers_role_is_protected() {
        let mut org = org();
        assert!(org
            .set_role_state(MANAGERS_ROLE, ActivationState::Suspended)
            .is_err());
        assert!(org
            .revoke_permission(MANAGERS_ROLE, Permission::RoleNew)
            .is_err());
    }

    #[test]
    fn test_document_permissions_not_granted_directly() {
        let mut org = org();
        org.add_role("Readers").unwrap();
        assert!(matches!(
            org.grant_permission("Readers", Permission::DocRead),
            Err(DomainError::Invalid(_))
        ));
        org.grant_permission("Readers", Permission::DocNew).unwrap();
        assert_eq!(
            org.permission_roles(Permission::DocNew)["Readers"],
            json!("active")
        );
    }

    #[test]
    fn test_suspended_role_grants_nothing() {
        let mut org = org();
        org.add_subject(subject("bob")).unwrap();
        org.add_role("Editors").unwrap();
        org.grant_permission("Editors", Permission::DocNew).unwrap();
        org.add_role_subject("Editors", "bob").unwrap();

        let roles = vec!["Editors".to_string()];
        assert!(org.ensure_permission(&roles, Permission::DocNew).is_ok());

        org.set_role_state("Editors", ActivationState::Suspended).unwrap();
        assert_eq!(
            org.ensure_permission(&roles, Permission::DocNew),
            Err(DomainError::PermissionDenied(Permission::DocNew))
        );
        assert!(org.ensure_can_assume("bob", "Editors").is_err());
    }

    #[test]
    fn test_assume_requires_membership() {
        let mut org = org();
        org.add_subject(subject("bob")).unwrap();
        assert!(org.ensure_can_assume("alice", MANAGERS_ROLE).is_ok());
        assert!(matches!(
            org.ensure_can_assume("bob", MANAGERS_ROLE),
            Err(DomainError::RoleNotHeld(_))
        ));
        assert!(org.ensure_can_assume("bob", "Ghosts").is_err());
    }

    #[test]
    fn test_document_acl_defaults_and_changes() {
        let mut org = org();
        org.add_role("Readers").unwrap();
        org.add_document(document("report", "alice", 1)).unwrap();

        let readers = vec!["Readers".to_string()];
        assert!(org
            .ensure_document_permission(&managers(), "report", Permission::DocRead)
            .is_ok());
        assert!(org
            .ensure_document_permission(&readers, "report", Permission::DocRead)
            .is_err());

        org.change_acl("report", AclOperation::Add, "Readers", Permission::DocRead)
            .unwrap();
        assert!(org
            .ensure_document_permission(&readers, "report", Permission::DocRead)
            .is_ok());
        assert_eq!(
            org.role_permissions("Readers").unwrap()["DOC_READ"],
            json!(["report"])
        );

        org.change_acl("report", AclOperation::Remove, "Readers", Permission::DocRead)
            .unwrap();
        assert!(!org.document("report").unwrap().acl.contains_key("Readers"));
    }

    #[test]
    fn test_last_doc_acl_holder_kept() {
        let mut org = org();
        org.add_document(document("report", "alice", 1)).unwrap();

        assert!(matches!(
            org.change_acl("report", AclOperation::Remove, MANAGERS_ROLE, Permission::DocAcl),
            Err(DomainError::Invariant(_))
        ));
        assert!(org.document("report").unwrap().acl[MANAGERS_ROLE].contains(&Permission::DocAcl));
    }

    #[test]
    fn test_delete_document_twice() {
        let mut org = org();
        org.add_document(document("report", "alice", 1)).unwrap();

        let handle = org.delete_document("report", "alice").unwrap();
        assert_eq!(handle, format!("{:064x}", 1));
        assert_eq!(org.document("report").unwrap().deleter.as_deref(), Some("alice"));
        assert!(matches!(
            org.delete_document("report", "alice"),
            Err(DomainError::DocumentNotFound(_))
        ));
    }

    #[test]
    fn test_list_documents_filters() {
        let mut org = org();
        org.add_subject(subject("bob")).unwrap();
        org.add_document(document("a", "alice", 1)).unwrap();
        org.add_document(document("b", "bob", 5)).unwrap();
        org.add_document(document("c", "alice", 9)).unwrap();

        let day = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        let names = |docs: Vec<DocumentSummary>| {
            docs.into_iter().map(|d| d.document_name).collect::<Vec<_>>()
        };

        assert_eq!(names(org.list_documents(Some("alice"), None)), ["a", "c"]);
        assert_eq!(names(org.list_documents(None, Some((DateFilter::NewerThan, day)))), ["c"]);
        assert_eq!(names(org.list_documents(None, Some((DateFilter::OlderThan, day)))), ["a"]);
        assert_eq!(names(org.list_documents(None, Some((DateFilter::EqualTo, day)))), ["b"]);
        assert!(org
            .list_documents(Some("bob"), Some((DateFilter::OlderThan, day)))
            .is_empty());
    }

    #[test]
    fn test_subject_and_role_listings() {
        let mut org = org();
        org.add_subject(subject("bob")).unwrap();
        org.add_role("Auditors").unwrap();
        org.add_role_subject("Auditors", "bob").unwrap();
        org.set_subject_state("bob", ActivationState::Suspended).unwrap();

        assert_eq!(org.subject_states(None).unwrap().len(), 2);
        assert_eq!(
            org.subject_states(Some("bob")).unwrap()["bob"],
            ActivationState::Suspended
        );
        assert!(org.subject_states(Some("carol")).is_err());
        assert_eq!(
            org.role_subjects("Auditors").unwrap()["bob"],
            ActivationState::Suspended
        );
        assert_eq!(
            org.subject_roles("bob").unwrap().keys().collect::<Vec<_>>(),
            ["Auditors"]
        );
        assert!(matches!(
            org.ensure_active("bob"),
            Err(DomainError::InactiveSubject(_))
        ));
    }
}
