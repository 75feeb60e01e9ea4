//! Organization listing plus subject and role management.

use axum::{extract::State, Json};
use sio_core::protocol::{
    ActivationState, NewSubject, OrganizationSummary, PermissionRequest, RolePermissionChange,
    RoleRequest, RoleSubjectChange, SubjectQuery, SubjectStateChange, UsernameRequest,
};

use crate::error::AppResult;
use crate::session::{SessionReply, SessionRequest};
use crate::state::AppState;

/// List organizations.
///
/// `GET /api/v1/organizations/`
///
/// # Response
///
/// ```json
/// [{"name": "acme"}, {"name": "globex"}]
/// ```
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<OrganizationSummary>>> {
    let names = state.store.list().await?;
    Ok(Json(
        names
            .into_iter()
            .map(|name| OrganizationSummary { name })
            .collect(),
    ))
}

/// Subject states, optionally for one subject.
///
/// `GET /api/v1/organizations/subjects/state` with `{"username": "bob"}` or `{}`;
/// replies `{"bob": "active"}`.
pub async fn subject_states(
    State(state): State<AppState>,
    request: SessionRequest<SubjectQuery>,
) -> SessionReply {
    let result = state
        .organizations
        .subject_states(&request.ctx, request.payload.username.as_deref())
        .await;
    SessionReply::from_result(&request.ctx, result)
}

/// Suspend or activate a subject.
///
/// `PUT /api/v1/organizations/subjects/state` with `{"username": "bob", "state": "suspended"}`
///
/// Requires `SUBJECT_DOWN` to suspend and `SUBJECT_UP` to activate.
pub async fn set_subject_state(
    State(state): State<AppState>,
    request: SessionRequest<SubjectStateChange>,
) -> SessionReply {
    let SubjectStateChange { username, state: target } = &request.payload;
    let result = state
        .organizations
        .set_subject_state(&request.ctx, username, *target)
        .await;
    SessionReply::from_result(&request.ctx, result)
}

/// Add a subject.
///
/// `POST /api/v1/organizations/subjects` with `{username, name, email, public_key}`
///
/// Requires `SUBJECT_NEW`.
pub async fn add_subject(
    State(state): State<AppState>,
    request: SessionRequest<NewSubject>,
) -> SessionReply {
    let SessionRequest { ctx, payload } = request;
    let result = state.organizations.add_subject(&ctx, payload).await;
    SessionReply::from_result(&ctx, result)
}

/// Members of a role.
///
/// `GET /api/v1/organizations/roles/subjects` with `{"role": "Managers"}`
pub async fn role_subjects(
    State(state): State<AppState>,
    request: SessionRequest<RoleRequest>,
) -> SessionReply {
    let result = state
        .organizations
        .role_subjects(&request.ctx, &request.payload.role)
        .await;
    SessionReply::from_result(&request.ctx, result)
}

/// Roles held by a subject.
///
/// `GET /api/v1/organizations/subjects/roles` with `{"username": "alice"}`
pub async fn subject_roles(
    State(state): State<AppState>,
    request: SessionRequest<UsernameRequest>,
) -> SessionReply {
    let result = state
        .organizations
        .subject_roles(&request.ctx, &request.payload.username)
        .await;
    SessionReply::from_result(&request.ctx, result)
}

/// Permissions of a role.
///
/// `GET /api/v1/organizations/roles/permissions` with `{"role": "Editors"}`
///
/// # Response
///
/// ```json
/// {"DOC_NEW": "organization", "DOC_READ": ["report", "budget"]}
/// ```
pub async fn role_permissions(
    State(state): State<AppState>,
    request: SessionRequest<RoleRequest>,
) -> SessionReply {
    let result = state
        .organizations
        .role_permissions(&request.ctx, &request.payload.role)
        .await;
    SessionReply::from_result(&request.ctx, result)
}

/// Roles holding a permission.
///
/// `GET /api/v1/organizations/permissions/roles` with `{"permission": "DOC_READ"}`
pub async fn permission_roles(
    State(state): State<AppState>,
    request: SessionRequest<PermissionRequest>,
) -> SessionReply {
    let result = state
        .organizations
        .permission_roles(&request.ctx, request.payload.permission)
        .await;
    SessionReply::from_result(&request.ctx, result)
}

/// Create a role.
///
/// `POST /api/v1/organizations/roles` with `{"role": "Editors"}`
///
/// Requires `ROLE_NEW`.
pub async fn add_role(
    State(state): State<AppState>,
    request: SessionRequest<RoleRequest>,
) -> SessionReply {
    let result = state
        .organizations
        .add_role(&request.ctx, &request.payload.role)
        .await;
    SessionReply::from_result(&request.ctx, result)
}

/// Suspend a role.
///
/// `PUT /api/v1/organizations/roles/suspend` with `{"role": "Editors"}`
///
/// Requires `ROLE_DOWN`.
pub async fn suspend_role(
    State(state): State<AppState>,
    request: SessionRequest<RoleRequest>,
) -> SessionReply {
    let result = state
        .organizations
        .set_role_state(&request.ctx, &request.payload.role, ActivationState::Suspended)
        .await;
    SessionReply::from_result(&request.ctx, result)
}

/// Reactivate a role.
///
/// `PUT /api/v1/organizations/roles/reactivate` with `{"role": "Editors"}`
///
/// Requires `ROLE_UP`.
pub async fn reactivate_role(
    State(state): State<AppState>,
    request: SessionRequest<RoleRequest>,
) -> SessionReply {
    let result = state
        .organizations
        .set_role_state(&request.ctx, &request.payload.role, ActivationState::Active)
        .await;
    SessionReply::from_result(&request.ctx, result)
}

/// Grant an organization permission to a role.
///
/// `POST /api/v1/organizations/roles/permissions` with `{"role": "Editors", "permission": "DOC_NEW"}`
///
/// Requires `ROLE_MOD`.
pub async fn grant_permission(
    State(state): State<AppState>,
    request: SessionRequest<RolePermissionChange>,
) -> SessionReply {
    let RolePermissionChange { role, permission } = &request.payload;
    let result = state
        .organizations
        .grant_permission(&request.ctx, role, *permission)
        .await;
    SessionReply::from_result(&request.ctx, result)
}

/// Revoke an organization permission from a role.
///
/// `DELETE /api/v1/organizations/roles/permissions` with `{"role": "Editors", "permission": "DOC_NEW"}`
///
/// Requires `ROLE_MOD`.
pub async fn revoke_permission(
    State(state): State<AppState>,
    request: SessionRequest<RolePermissionChange>,
) -> SessionReply {
    let RolePermissionChange { role, permission } = &request.payload;
    let result = state
        .organizations
        .revoke_permission(&request.ctx, role, *permission)
        .await;
    SessionReply::from_result(&request.ctx, result)
}

/// Add a subject to a role.
///
/// `POST /api/v1/organizations/roles/subjects` with `{"role": "Editors", "username": "bob"}`
///
/// Requires `ROLE_MOD`.
pub async fn add_role_subject(
    State(state): State<AppState>,
    request: SessionRequest<RoleSubjectChange>,
) -> SessionReply {
    let RoleSubjectChange { role, username } = &request.payload;
    let result = state
        .organizations
        .add_role_subject(&request.ctx, role, username)
        .await;
    SessionReply::from_result(&request.ctx, result)
}

/// Remove a subject from a role.
///
/// `DELETE /api/v1/organizations/roles/subjects` with `{"role": "Editors", "username": "bob"}`
///
/// Requires `ROLE_MOD`.
pub async fn remove_role_subject(
    State(state): State<AppState>,
    request: SessionRequest<RoleSubjectChange>,
) -> SessionReply {
    let RoleSubjectChange { role, username } = &request.payload;
    let result = state
        .organizations
        .remove_role_subject(&request.ctx, role, username)
        .await;
    SessionReply::from_result(&request.ctx, result)
}
