//! HTTP client for the repository API.
//!
//! Anonymous calls return [`SignedMessage`]s verified against the
//! repository key, and echoed fields are compared with what was sent.
//! Session calls seal the payload in a [`SessionEnvelope`] and track the
//! message counter in the [`SessionFile`].

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sio_core::crypto::{derive_subject_key, EphemeralKeyPair, PublicKey};
use sio_core::protocol::{
    CreateOrganization, EnvelopeHeader, FileContent, FileRequest, OrganizationSummary,
    SessionEnvelope, SessionGrant, SessionHandshake, SignedMessage, API_PREFIX,
    SESSION_ERROR_STATUS,
};

use crate::session_file::{SessionFile, SessionInfo};

#[derive(Clone)]
pub struct RepositoryClient {
    http: Client,
    base_url: String,
    repository_key: Option<PublicKey>,
}

impl RepositoryClient {
    /// `address` may omit the scheme; `http://` is assumed.
    pub fn new(address: &str, repository_key: Option<PublicKey>) -> Self {
        let address = address.trim_end_matches('/');
        let base_url = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };
        Self {
            http: Client::new(),
            base_url,
            repository_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    fn verify<T: DeserializeOwned>(&self, signed: &SignedMessage) -> Result<T> {
        let key = self
            .repository_key
            .as_ref()
            .context("Repository public key required to verify the response")?;
        signed
            .open(key)
            .context("Failed to verify repository signature")
    }

    async fn send_signed(
        &self,
        method: Method,
        path: &str,
        body: &impl Serialize,
        action: &str,
    ) -> Result<SignedMessage> {
        let response = self
            .http
            .request(method, self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", action))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("[{}] Failed to {}. Response: {}", status.as_u16(), action, text);
        }
        response
            .json()
            .await
            .with_context(|| format!("Invalid {} response", action))
    }

    /// `POST /auth/organization`. Returns the verified echo.
    pub async fn create_organization(&self, request: &CreateOrganization) -> Result<CreateOrganization> {
        let signed = self
            .send_signed(Method::POST, "/auth/organization", request, "create organization")
            .await?;
        let echoed: CreateOrganization = self.verify(&signed)?;
        if &echoed != request {
            anyhow::bail!("Create organization failed: repository echoed different organization data");
        }
        Ok(echoed)
    }

    /// `GET /organizations/`.
    pub async fn list_organizations(&self) -> Result<Vec<OrganizationSummary>> {
        let response = self
            .http
            .get(self.url("/organizations/"))
            .send()
            .await
            .context("Failed to send list organizations request")?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("[{}] Failed to list organizations. Response: {}", status.as_u16(), text);
        }
        Ok(response.json().await?)
    }

    /// Handshake for a new session, signed with the password-derived key.
    pub async fn create_session(
        &self,
        organization: &str,
        username: &str,
        password: &str,
    ) -> Result<(SessionInfo, SessionGrant)> {
        let credentials = derive_subject_key(password)?;
        let ephemeral = EphemeralKeyPair::generate()?;

        let handshake = SignedMessage::sign(
            &credentials,
            &SessionHandshake {
                organization: organization.to_string(),
                username: username.to_string(),
                client_ephemeral_public_key: ephemeral.public_pem().to_string(),
            },
        )?;
        let signed = self
            .send_signed(Method::POST, "/auth/session", &handshake, "create session")
            .await?;
        let grant: SessionGrant = self.verify(&signed)?;
        if grant.organization != organization || grant.username != username {
            anyhow::bail!("Create session failed: repository granted a session for another subject");
        }

        let key = ephemeral.derive_session_key(&grant.server_ephemeral_public_key)?;
        tracing::debug!(session_id = %grant.session_id, expires_at = %grant.expires_at, "Session established");

        let info = SessionInfo {
            session_id: grant.session_id.clone(),
            organization: organization.to_string(),
            username: username.to_string(),
            derived_key: hex::encode(key),
            msg_id: 0,
            roles: Vec::new(),
        };
        Ok((info, grant))
    }

    /// `GET /files/`. Returns the stored `nonce || ciphertext` blob.
    pub async fn get_file(&self, file_handle: &str) -> Result<Vec<u8>> {
        let signed = self
            .send_signed(
                Method::GET,
                "/files/",
                &FileRequest {
                    file_handle: file_handle.to_string(),
                },
                "get file",
            )
            .await?;
        let content: FileContent = self.verify(&signed)?;
        if content.file_handle != file_handle {
            anyhow::bail!("Get file failed: repository returned a different file handle");
        }
        BASE64
            .decode(content.file_content)
            .context("File content is not valid base64")
    }

    /// Send `payload` over the session and return the decrypted reply.
    ///
    /// The bumped counter is saved before sending, so a lost reply never
    /// leads to reusing a message id.
    pub async fn session_call<T: DeserializeOwned>(
        &self,
        session: &mut SessionFile,
        method: Method,
        path: &str,
        payload: &impl Serialize,
    ) -> Result<T> {
        let key = session.key()?;
        let msg_id = session.info.msg_id + 1;
        session.info.msg_id = msg_id;
        session.save()?;

        let envelope = SessionEnvelope::seal(
            &key,
            EnvelopeHeader::new(session.info.session_id.clone(), msg_id),
            payload,
        )?;
        tracing::debug!(method = %method, path, msg_id, "Session request");

        let response = self
            .http
            .request(method, self.url(path))
            .json(&envelope)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", path))?;

        let status = response.status();
        if status.as_u16() == SESSION_ERROR_STATUS {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("[{}] {}", status.as_u16(), text);
        }

        let reply: SessionEnvelope = response
            .json()
            .await
            .with_context(|| format!("Invalid session reply from {}", path))?;
        if reply.session_id() != session.info.session_id {
            anyhow::bail!("Session reply belongs to another session");
        }
        let body: Value = reply
            .open(&key)
            .context("Failed to open session reply")?;
        if reply.msg_id() <= msg_id {
            anyhow::bail!(
                "Replayed reply for session {} (msg_id {} after {})",
                session.info.session_id,
                reply.msg_id(),
                msg_id
            );
        }
        session.info.msg_id = reply.msg_id();
        session.save()?;

        if status != StatusCode::OK {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string());
            anyhow::bail!("[{}] Failed to execute {}: {}", status.as_u16(), path, error);
        }
        serde_json::from_value(body).with_context(|| format!("Unexpected reply from {}", path))
    }
}
