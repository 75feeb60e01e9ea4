//! In-memory registry of open sessions.
//!
//! A session binds a derived AES key to one subject of one organization. Each
//! request must carry a `msg_id` above the last one seen; the reply uses the
//! next id so the client can detect replayed responses as well.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sio_core::crypto::SessionKey;
use sio_core::protocol::SessionEnvelope;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// State kept for one open session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub organization: String,
    pub username: String,
    key: SessionKey,
    /// Highest message id consumed so far (the id of the last reply).
    pub last_msg_id: u64,
    pub roles: BTreeSet<String>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Identity of an authenticated request and the id its reply must carry.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub organization: String,
    pub username: String,
    pub roles: Vec<String>,
    pub reply_msg_id: u64,
    pub key: SessionKey,
}

#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    lifetime: chrono::Duration,
}

impl SessionRegistry {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            lifetime: chrono::Duration::from_std(lifetime).unwrap_or(chrono::Duration::hours(1)),
        }
    }

    /// Register a session for a subject whose handshake verified.
    pub async fn open(&self, organization: &str, username: &str, key: SessionKey) -> Session {
        let session = Session {
            id: Uuid::new_v4().to_string(),
            organization: organization.to_string(),
            username: username.to_string(),
            key,
            last_msg_id: 0,
            roles: BTreeSet::new(),
            expires_at: Utc::now() + self.lifetime,
        };

        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());

        tracing::info!(
            session_id = %session.id,
            organization = %organization,
            username = %username,
            expires_at = %session.expires_at,
            "Session opened"
        );
        session
    }

    /// Open an envelope: check the session, decrypt, reject replays.
    pub async fn authenticate(
        &self,
        envelope: &SessionEnvelope,
    ) -> AppResult<(SessionContext, Value)> {
        let mut sessions = self.sessions.write().await;
        let session_id = envelope.session_id();

        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| AppError::Session("Unknown session".to_string()))?;

        if session.is_expired(Utc::now()) {
            sessions.remove(session_id);
            tracing::debug!(session_id = %session_id, "Rejected message for expired session");
            return Err(AppError::Session("Session expired".to_string()));
        }

        let payload: Value = envelope
            .open(&session.key)
            .map_err(|e| AppError::Session(format!("Invalid message: {}", e)))?;

        let msg_id = envelope.msg_id();
        if msg_id <= session.last_msg_id {
            tracing::warn!(
                session_id = %session_id,
                msg_id,
                last_msg_id = session.last_msg_id,
                "Replayed message rejected"
            );
            return Err(AppError::Session("Replayed message".to_string()));
        }

        // The reply needs an id above the request's.
        let reply_msg_id = msg_id
            .checked_add(1)
            .ok_or_else(|| AppError::Session("Message id space exhausted".to_string()))?;
        session.last_msg_id = reply_msg_id;

        Ok((
            SessionContext {
                session_id: session.id.clone(),
                organization: session.organization.clone(),
                username: session.username.clone(),
                roles: session.roles.iter().cloned().collect(),
                reply_msg_id,
                key: session.key,
            },
            payload,
        ))
    }

    /// Add a role to the session. Returns `false` if it was already assumed.
    pub async fn assume_role(&self, session_id: &str, role: &str) -> AppResult<bool> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| AppError::Session("Unknown session".to_string()))?;
        Ok(session.roles.insert(role.to_string()))
    }

    /// Drop a role from the session. Returns `false` if it was not assumed.
    pub async fn drop_role(&self, session_id: &str, role: &str) -> AppResult<bool> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| AppError::Session("Unknown session".to_string()))?;
        Ok(session.roles.remove(role))
    }

    pub async fn roles(&self, session_id: &str) -> AppResult<Vec<String>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .map(|s| s.roles.iter().cloned().collect())
            .ok_or_else(|| AppError::Session("Unknown session".to_string()))
    }

    /// Remove expired sessions; returns how many were dropped.
    pub async fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        before - sessions.len()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Start the background task that drops expired sessions.
    pub fn start_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // Skip first immediate tick

            loop {
                ticker.tick().await;

                let removed = registry.sweep().await;
                if removed > 0 {
                    tracing::info!(removed, "Expired sessions removed");
                } else {
                    tracing::trace!("Session sweep found nothing to remove");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sio_core::protocol::EnvelopeHeader;

    const KEY: SessionKey = [9u8; 32];

    fn envelope(session_id: &str, msg_id: u64, key: &SessionKey) -> SessionEnvelope {
        SessionEnvelope::seal(
            key,
            EnvelopeHeader::new(session_id, msg_id),
            &json!({"role": "Managers"}),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_authenticate_advances_msg_id() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let session = registry.open("acme", "alice", KEY).await;

        let (ctx, payload) = registry
            .authenticate(&envelope(&session.id, 1, &KEY))
            .await
            .unwrap();
        assert_eq!(ctx.reply_msg_id, 2);
        assert_eq!(ctx.username, "alice");
        assert_eq!(payload["role"], "Managers");

        // The reply used id 2, so the next request must go above it.
        assert!(registry
            .authenticate(&envelope(&session.id, 2, &KEY))
            .await
            .is_err());
        let (ctx, _) = registry
            .authenticate(&envelope(&session.id, 3, &KEY))
            .await
            .unwrap();
        assert_eq!(ctx.reply_msg_id, 4);
    }

    #[tokio::test]
    async fn test_replay_rejected() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let session = registry.open("acme", "alice", KEY).await;
        let message = envelope(&session.id, 5, &KEY);

        registry.authenticate(&message).await.unwrap();
        let err = registry.authenticate(&message).await.unwrap_err();
        assert!(matches!(err, AppError::Session(ref m) if m == "Replayed message"));
    }

    #[tokio::test]
    async fn test_max_msg_id_does_not_reset_counter() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let session = registry.open("acme", "alice", KEY).await;
        registry
            .authenticate(&envelope(&session.id, 7, &KEY))
            .await
            .unwrap();

        let err = registry
            .authenticate(&envelope(&session.id, u64::MAX, &KEY))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Session(ref m) if m == "Message id space exhausted"));

        // Earlier ids stay rejected; the counter did not wrap.
        let err = registry
            .authenticate(&envelope(&session.id, 1, &KEY))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Session(ref m) if m == "Replayed message"));
        let (ctx, _) = registry
            .authenticate(&envelope(&session.id, 9, &KEY))
            .await
            .unwrap();
        assert_eq!(ctx.reply_msg_id, 10);
    }

    #[tokio::test]
    async fn test_unknown_and_wrong_key() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let session = registry.open("acme", "alice", KEY).await;

        assert!(matches!(
            registry.authenticate(&envelope("nope", 1, &KEY)).await,
            Err(AppError::Session(_))
        ));
        assert!(matches!(
            registry.authenticate(&envelope(&session.id, 1, &[1u8; 32])).await,
            Err(AppError::Session(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_session_rejected_and_swept() {
        let registry = SessionRegistry::new(Duration::ZERO);
        let session = registry.open("acme", "alice", KEY).await;
        registry.open("acme", "bob", KEY).await;

        let err = registry
            .authenticate(&envelope(&session.id, 1, &KEY))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Session(ref m) if m == "Session expired"));
        assert_eq!(registry.count().await, 1);

        assert_eq!(registry.sweep().await, 1);
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_roles() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let session = registry.open("acme", "alice", KEY).await;

        assert!(registry.assume_role(&session.id, "Managers").await.unwrap());
        assert!(!registry.assume_role(&session.id, "Managers").await.unwrap());
        assert_eq!(registry.roles(&session.id).await.unwrap(), ["Managers"]);
        assert!(registry.drop_role(&session.id, "Managers").await.unwrap());
        assert!(!registry.drop_role(&session.id, "Managers").await.unwrap());
    }
}
