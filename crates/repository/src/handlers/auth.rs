//! Organization creation and session handshake.

use axum::{extract::State, Json};
use sio_core::protocol::{CreateOrganization, SignedMessage};

use crate::error::AppResult;
use crate::state::AppState;

/// Create an organization.
///
/// `POST /api/v1/auth/organization`
///
/// # Request Body
///
/// ```json
/// {
///   "organization": "acme",
///   "username": "alice",
///   "name": "Alice Doe",
///   "email": "alice@acme.org",
///   "public_key": "-----BEGIN PUBLIC KEY-----\n..."
/// }
/// ```
///
/// # Response
///
/// `200 OK` with the request echoed as a [`SignedMessage`]; `409` if
/// the organization exists.
pub async fn create_organization(
    State(state): State<AppState>,
    Json(request): Json<CreateOrganization>,
) -> AppResult<Json<SignedMessage>> {
    Ok(Json(state.auth.create_organization(request).await?))
}

/// Open a session.
///
/// `POST /api/v1/auth/session`
///
/// The body is a [`SignedMessage`] whose associated data is
/// `{organization, username, client_ephemeral_public_key}`, signed with the
/// subject's password-derived key. The signed response carries
/// `{session_id, organization, username, server_ephemeral_public_key, expires_at}`.
pub async fn create_session(
    State(state): State<AppState>,
    Json(message): Json<SignedMessage>,
) -> AppResult<Json<SignedMessage>> {
    Ok(Json(state.auth.create_session(message).await?))
}
