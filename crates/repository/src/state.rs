//! Application state for the SIO Repository server.
//!
//! Shared resources and the services built on them, passed to every
//! handler through Axum's state management.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::crypto::Encryptor;
use crate::files::FileStore;
use crate::identity::ServerIdentity;
use crate::services::{AuthService, DocumentService, FileService, OrganizationService};
use crate::session::SessionRegistry;
use crate::store::OrganizationStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Organization aggregates
    pub store: Arc<dyn OrganizationStore>,

    /// Open sessions
    pub sessions: SessionRegistry,

    /// Organization creation and session handshakes
    pub auth: AuthService,

    /// Subjects, roles and permissions
    pub organizations: OrganizationService,

    /// Document metadata and ACLs
    pub documents: DocumentService,

    /// Anonymous file downloads
    pub files: FileService,

    /// Server start time for uptime calculation
    pub start_time: Instant,
}

impl AppState {
    /// Wire the services together.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn OrganizationStore>,
        file_store: FileStore,
        identity: ServerIdentity,
        encryptor: Encryptor,
    ) -> Self {
        let identity = Arc::new(identity);
        let sessions = SessionRegistry::new(Duration::from_secs(config.session_lifetime_secs));

        Self {
            auth: AuthService::new(store.clone(), sessions.clone(), identity.clone()),
            organizations: OrganizationService::new(store.clone(), sessions.clone()),
            documents: DocumentService::new(store.clone(), file_store.clone(), encryptor),
            files: FileService::new(file_store, identity),
            config: Arc::new(config),
            store,
            sessions,
            start_time: Instant::now(),
        }
    }

    /// Get the server uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
