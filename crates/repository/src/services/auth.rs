//! Anonymous entry points: creating organizations and opening sessions.

use std::sync::Arc;

use chrono::Utc;
use sio_core::crypto::{normalize_public_key_pem, public_key_from_pem, EphemeralKeyPair};
use sio_core::protocol::{CreateOrganization, SessionGrant, SessionHandshake, SignedMessage};

use crate::domain::{Organization, Subject};
use super::load_organization;
use crate::error::{AppError, AppResult};
use crate::identity::ServerIdentity;
use crate::session::SessionRegistry;
use crate::store::OrganizationStore;

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn OrganizationStore>,
    sessions: SessionRegistry,
    identity: Arc<ServerIdentity>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn OrganizationStore>,
        sessions: SessionRegistry,
        identity: Arc<ServerIdentity>,
    ) -> Self {
        Self {
            store,
            sessions,
            identity,
        }
    }

    /// Create an organization whose founder becomes its first manager.
    ///
    /// The response is the request echoed back under the repository
    /// signature.
    pub async fn create_organization(&self, request: CreateOrganization) -> AppResult<SignedMessage> {
        for (field, value) in [
            ("organization", &request.organization),
            ("username", &request.username),
            ("name", &request.name),
            ("email", &request.email),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("'{}' must not be empty", field)));
            }
        }
        let public_key = normalize_public_key_pem(&request.public_key)?;

        let founder = Subject::new(
            request.username.clone(),
            request.name.clone(),
            request.email.clone(),
            public_key,
        );
        self.store
            .insert(Organization::new(
                request.organization.clone(),
                founder,
                Utc::now(),
            ))
            .await?;

        tracing::info!(
            organization = %request.organization,
            username = %request.username,
            "Organization created"
        );
        self.identity.sign(&request)
    }

    /// Verify a handshake signed with the subject's credentials and open a
    /// session keyed by ephemeral ECDH.
    pub async fn create_session(&self, message: SignedMessage) -> AppResult<SignedMessage> {
        // Unverified parse, only to find whose key must verify it.
        let claimed: SessionHandshake = serde_json::from_str(&message.associated_data)
            .map_err(|e| AppError::BadRequest(format!("Invalid handshake: {}", e)))?;

        let organization = load_organization(self.store.as_ref(), &claimed.organization).await?;
        let subject = organization.subject(&claimed.username)?;

        let subject_key = public_key_from_pem(&subject.public_key)?;
        let handshake: SessionHandshake = message.open(&subject_key).map_err(|_| {
            tracing::warn!(
                organization = %claimed.organization,
                username = %claimed.username,
                "Handshake signature rejected"
            );
            AppError::Auth("Invalid credentials".to_string())
        })?;

        organization.ensure_active(&handshake.username)?;

        let server_ephemeral = EphemeralKeyPair::generate()?;
        let key = server_ephemeral.derive_session_key(&handshake.client_ephemeral_public_key)?;
        let session = self
            .sessions
            .open(&handshake.organization, &handshake.username, key)
            .await;

        self.identity.sign(&SessionGrant {
            session_id: session.id,
            organization: session.organization,
            username: session.username,
            server_ephemeral_public_key: server_ephemeral.public_pem().to_string(),
            expires_at: session.expires_at,
        })
    }
}
