//! Subjects, roles and permissions of an organization.
//!
//! Every write re-checks the caller's permission inside the store update, so
//! the check and the change see the same snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use sio_core::crypto::normalize_public_key_pem;
use sio_core::protocol::{
    ActivationState, NewSubject, Permission, RoleListing, RoleState, StatusMessage, SubjectState,
};

use super::load_organization;
use crate::domain::{DomainError, Organization, Subject};
use crate::error::{AppError, AppResult};
use crate::session::{SessionContext, SessionRegistry};
use crate::store::OrganizationStore;

#[derive(Clone)]
pub struct OrganizationService {
    store: Arc<dyn OrganizationStore>,
    sessions: SessionRegistry,
}

impl OrganizationService {
    pub fn new(store: Arc<dyn OrganizationStore>, sessions: SessionRegistry) -> Self {
        Self { store, sessions }
    }

    async fn snapshot(&self, ctx: &SessionContext) -> AppResult<Organization> {
        load_organization(self.store.as_ref(), &ctx.organization).await
    }

    /// Apply `change` if one of the session's active roles holds `permission`.
    async fn modify(
        &self,
        ctx: &SessionContext,
        permission: Permission,
        mut change: impl FnMut(&mut Organization) -> Result<(), DomainError> + Send,
    ) -> AppResult<()> {
        self.store
            .update(&ctx.organization, &mut |org| {
                org.ensure_permission(&ctx.roles, permission)?;
                change(org)?;
                Ok(())
            })
            .await
    }

    // -- Session roles -----------------------------------------------------

    pub async fn assume_role(&self, ctx: &SessionContext, role: &str) -> AppResult<StatusMessage> {
        self.snapshot(ctx).await?.ensure_can_assume(&ctx.username, role)?;

        if !self.sessions.assume_role(&ctx.session_id, role).await? {
            return Err(AppError::Conflict(format!("Role '{}' is already assumed", role)));
        }
        tracing::info!(session_id = %ctx.session_id, role = %role, "Role assumed");
        Ok(StatusMessage::new(format!("Role '{}' assumed", role)))
    }

    pub async fn drop_role(&self, ctx: &SessionContext, role: &str) -> AppResult<StatusMessage> {
        if !self.sessions.drop_role(&ctx.session_id, role).await? {
            return Err(AppError::BadRequest(format!("Role '{}' is not assumed", role)));
        }
        tracing::info!(session_id = %ctx.session_id, role = %role, "Role dropped");
        Ok(StatusMessage::new(format!("Role '{}' dropped", role)))
    }

    pub async fn session_roles(&self, ctx: &SessionContext) -> AppResult<RoleListing> {
        Ok(RoleListing {
            roles: self.sessions.roles(&ctx.session_id).await?,
        })
    }

    // -- Subjects ----------------------------------------------------------

    pub async fn subject_states(
        &self,
        ctx: &SessionContext,
        username: Option<&str>,
    ) -> AppResult<BTreeMap<String, SubjectState>> {
        Ok(self.snapshot(ctx).await?.subject_states(username)?)
    }

    pub async fn set_subject_state(
        &self,
        ctx: &SessionContext,
        username: &str,
        state: SubjectState,
    ) -> AppResult<StatusMessage> {
        let permission = match state {
            ActivationState::Active => Permission::SubjectUp,
            ActivationState::Suspended => Permission::SubjectDown,
        };
        self.modify(ctx, permission, |org| org.set_subject_state(username, state))
            .await?;

        tracing::info!(
            organization = %ctx.organization,
            username = %username,
            state = %state,
            "Subject state changed"
        );
        Ok(StatusMessage::new(format!("Subject '{}' is now {}", username, state)))
    }

    pub async fn add_subject(
        &self,
        ctx: &SessionContext,
        request: NewSubject,
    ) -> AppResult<StatusMessage> {
        let public_key = normalize_public_key_pem(&request.public_key)?;
        let subject = Subject::new(&request.username, request.name, request.email, public_key);

        self.modify(ctx, Permission::SubjectNew, |org| {
            org.add_subject(subject.clone())
        })
        .await?;

        tracing::info!(
            organization = %ctx.organization,
            username = %request.username,
            "Subject added"
        );
        Ok(StatusMessage::new(format!("Subject '{}' added", request.username)))
    }

    // -- Roles -------------------------------------------------------------

    pub async fn role_subjects(
        &self,
        ctx: &SessionContext,
        role: &str,
    ) -> AppResult<BTreeMap<String, SubjectState>> {
        Ok(self.snapshot(ctx).await?.role_subjects(role)?)
    }

    pub async fn subject_roles(
        &self,
        ctx: &SessionContext,
        username: &str,
    ) -> AppResult<BTreeMap<String, RoleState>> {
        Ok(self.snapshot(ctx).await?.subject_roles(username)?)
    }

    pub async fn role_permissions(
        &self,
        ctx: &SessionContext,
        role: &str,
    ) -> AppResult<BTreeMap<String, Value>> {
        Ok(self.snapshot(ctx).await?.role_permissions(role)?)
    }

    pub async fn permission_roles(
        &self,
        ctx: &SessionContext,
        permission: Permission,
    ) -> AppResult<BTreeMap<String, Value>> {
        Ok(self.snapshot(ctx).await?.permission_roles(permission))
    }

    pub async fn add_role(&self, ctx: &SessionContext, role: &str) -> AppResult<StatusMessage> {
        self.modify(ctx, Permission::RoleNew, |org| org.add_role(role))
            .await?;
        tracing::info!(organization = %ctx.organization, role = %role, "Role added");
        Ok(StatusMessage::new(format!("Role '{}' added", role)))
    }

    pub async fn set_role_state(
        &self,
        ctx: &SessionContext,
        role: &str,
        state: RoleState,
    ) -> AppResult<StatusMessage> {
        let permission = match state {
            ActivationState::Active => Permission::RoleUp,
            ActivationState::Suspended => Permission::RoleDown,
        };
        self.modify(ctx, permission, |org| org.set_role_state(role, state))
            .await?;

        tracing::info!(
            organization = %ctx.organization,
            role = %role,
            state = %state,
            "Role state changed"
        );
        Ok(StatusMessage::new(format!("Role '{}' is now {}", role, state)))
    }

    pub async fn grant_permission(
        &self,
        ctx: &SessionContext,
        role: &str,
        permission: Permission,
    ) -> AppResult<StatusMessage> {
        self.modify(ctx, Permission::RoleMod, |org| {
            org.grant_permission(role, permission)
        })
        .await?;
        Ok(StatusMessage::new(format!(
            "Permission {} granted to '{}'",
            permission, role
        )))
    }

    pub async fn revoke_permission(
        &self,
        ctx: &SessionContext,
        role: &str,
        permission: Permission,
    ) -> AppResult<StatusMessage> {
        self.modify(ctx, Permission::RoleMod, |org| {
            org.revoke_permission(role, permission)
        })
        .await?;
        Ok(StatusMessage::new(format!(
            "Permission {} removed from '{}'",
            permission, role
        )))
    }

    pub async fn add_role_subject(
        &self,
        ctx: &SessionContext,
        role: &str,
        username: &str,
    ) -> AppResult<StatusMessage> {
        self.modify(ctx, Permission::RoleMod, |org| {
            org.add_role_subject(role, username)
        })
        .await?;
        Ok(StatusMessage::new(format!(
            "Subject '{}' added to role '{}'",
            username, role
        )))
    }

    pub async fn remove_role_subject(
        &self,
        ctx: &SessionContext,
        role: &str,
        username: &str,
    ) -> AppResult<StatusMessage> {
        self.modify(ctx, Permission::RoleMod, |org| {
            org.remove_role_subject(role, username)
        })
        .await?;
        Ok(StatusMessage::new(format!(
            "Subject '{}' removed from role '{}'",
            username, role
        )))
    }
}
