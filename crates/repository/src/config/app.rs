//! Application configuration for the SIO Repository server.

use serde::Deserialize;

/// Development master key for sealing document keys at rest.
pub const DEFAULT_ENCRYPTION_KEY: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

/// Backend holding organization aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Mongo,
    Postgres,
    Memory,
}

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Application configuration loaded from environment variables.
///
/// Environment variables are prefixed with `SIO_`:
/// - `SIO_HOST`: Server bind address (default: "0.0.0.0")
/// - `SIO_PORT`: Server port (default: 5000)
/// - `SIO_FILES_LOCATION`: Directory holding encrypted document files (default: "/files")
/// - `SIO_KEY_FILE`: PKCS#8 PEM of the repository signing key (default: "repository_key.pem")
/// - `SIO_ENCRYPTION_KEY`: Base64 32-byte master key for document keys
/// - `SIO_SESSION_LIFETIME_SECS`: Session lifetime (default: 3600)
/// - `SIO_SESSION_SWEEP_INTERVAL`: Expired-session sweep period in seconds (default: 60)
/// - `SIO_STORE`: `mongo`, `postgres` or `memory` (default: mongo)
/// - `SIO_LOG_FORMAT`: `text` or `json` (default: text)
/// - `SIO_DEBUG`: Enable debug mode (default: false)
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding encrypted document files
    #[serde(default = "default_files_location")]
    pub files_location: String,

    /// Repository signing key file
    #[serde(default = "default_key_file")]
    pub key_file: String,

    /// Master key sealing document keys
    #[serde(default)]
    pub encryption_key: Option<String>,

    /// Session lifetime in seconds
    #[serde(default = "default_session_lifetime")]
    pub session_lifetime_secs: u64,

    /// Expired-session sweep interval in seconds
    #[serde(default = "default_sweep_interval")]
    pub session_sweep_interval: u64,

    /// Organization store backend
    #[serde(default)]
    pub store: StoreKind,

    /// Log line layout
    #[serde(default)]
    pub log_format: LogFormat,

    /// Enable debug mode
    #[serde(default)]
    pub debug: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_files_location() -> String {
    "/files".to_string()
}

fn default_key_file() -> String {
    "repository_key.pem".to_string()
}

fn default_session_lifetime() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    60
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables are prefixed with `SIO_`.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("SIO_").from_env::<AppConfig>()
    }

    /// Get the server bind address as a string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Configured master key, or the development default with a warning.
    pub fn encryption_key_or_default(&self) -> String {
        match self.encryption_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => key.to_string(),
            None => {
                tracing::warn!(
                    "SIO_ENCRYPTION_KEY not set, using default (not secure for production)"
                );
                DEFAULT_ENCRYPTION_KEY.to_string()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            files_location: default_files_location(),
            key_file: default_key_file(),
            encryption_key: None,
            session_lifetime_secs: default_session_lifetime(),
            session_sweep_interval: default_sweep_interval(),
            store: StoreKind::default(),
            log_format: LogFormat::default(),
            debug: false,
        }
    }
}
