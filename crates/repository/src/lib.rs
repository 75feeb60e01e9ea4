//! SIO Repository Library
//!
//! This crate provides the repository server for SIO, handling:
//!
//! - **Organizations**: Create organizations and manage their subjects and roles
//! - **Sessions**: Signed handshakes and encrypted, replay-protected session envelopes
//! - **Access Control**: Organization and per-document permissions granted to roles
//! - **Documents**: Metadata with sealed keys, backed by a content-addressed file store
//! - **Deployment Checks**: Validation of the compose manifest and build recipe
//!
//! ## Architecture
//!
//! Each organization is a single aggregate persisted as one MongoDB document
//! (a JSONB row in PostgreSQL, or kept in memory for development and tests).
//! Every change goes through [`store::OrganizationStore::update`], which
//! applies the mutation atomically to the whole aggregate. Sessions live in
//! process memory.
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from environment variables
//! - [`db`]: PostgreSQL connectivity, schema and queries
//! - [`store`]: Organization store backends (MongoDB, PostgreSQL, memory)
//! - [`domain`]: Organization aggregate and its access-control rules
//! - [`error`]: Custom error types with Axum integration
//! - [`handlers`]: HTTP route handlers
//! - [`session`]: Session registry and the encrypted-envelope extractor
//! - [`state`]: Shared application state
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sio_repository::{
//!     config::AppConfig, crypto::Encryptor, files::FileStore, identity::ServerIdentity,
//!     router::build_router, state::AppState, store::MemoryOrganizationStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::from_env()?;
//!     let files = FileStore::new(&config.files_location);
//!     let identity = ServerIdentity::load_or_create(&config.key_file)?;
//!     let encryptor = Encryptor::from_base64(&config.encryption_key_or_default())?;
//!     let state = AppState::new(config, Arc::new(MemoryOrganizationStore::new()), files, identity, encryptor);
//!     let app = build_router(state);
//!     // ... bind and serve
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crypto;
pub mod db;
pub mod deploy;
pub mod domain;
pub mod error;
pub mod files;
pub mod handlers;
pub mod identity;
pub mod result_ext;
pub mod router;
pub mod services;
pub mod session;
pub mod state;
pub mod store;

pub use error::{AppError, AppResult};
pub use result_ext::ResultExt;
