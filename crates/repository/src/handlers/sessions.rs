//! Roles assumed within a session.
//!
//! All bodies travel inside a session envelope.

use axum::extract::State;
use sio_core::protocol::RoleRequest;

use crate::session::{SessionReply, SessionRequest};
use crate::state::AppState;

/// Assume a role the subject holds.
///
/// `POST /api/v1/sessions/roles` with `{"role": "Managers"}`
pub async fn assume_role(
    State(state): State<AppState>,
    request: SessionRequest<RoleRequest>,
) -> SessionReply {
    let result = state
        .organizations
        .assume_role(&request.ctx, &request.payload.role)
        .await;
    SessionReply::from_result(&request.ctx, result)
}

/// Release an assumed role.
///
/// `DELETE /api/v1/sessions/roles` with `{"role": "Managers"}`
pub async fn drop_role(
    State(state): State<AppState>,
    request: SessionRequest<RoleRequest>,
) -> SessionReply {
    let result = state
        .organizations
        .drop_role(&request.ctx, &request.payload.role)
        .await;
    SessionReply::from_result(&request.ctx, result)
}

/// List the roles assumed in this session.
///
/// `GET /api/v1/sessions/roles` with `{}`; replies `{"roles": [...]}`.
pub async fn list_roles(
    State(state): State<AppState>,
    request: SessionRequest<serde_json::Value>,
) -> SessionReply {
    let result = state.organizations.session_roles(&request.ctx).await;
    SessionReply::from_result(&request.ctx, result)
}
