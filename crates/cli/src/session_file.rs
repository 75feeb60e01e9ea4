//! Session context stored by `rep create-session`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sio_core::crypto::{session_key_from_hex, SessionKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub organization: String,
    pub username: String,
    /// Hex of the ECDH-derived session key.
    pub derived_key: String,
    /// Last message id seen on this session, sent or received.
    pub msg_id: u64,
    /// Roles assumed through this client.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A session file on disk together with its contents.
#[derive(Debug)]
pub struct SessionFile {
    path: PathBuf,
    pub info: SessionInfo,
}

impl SessionFile {
    pub fn create(path: impl Into<PathBuf>, info: SessionInfo) -> Result<Self> {
        let file = Self {
            path: path.into(),
            info,
        };
        file.save()?;
        Ok(file)
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read session file: {}", path.display()))?;
        let info = serde_json::from_str(&content)
            .with_context(|| format!("Invalid session file: {}", path.display()))?;
        Ok(Self { path, info })
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.info)?)
            .with_context(|| format!("Failed to write session file: {}", self.path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key(&self) -> Result<SessionKey> {
        session_key_from_hex(&self.info.derived_key).context("Session file holds an invalid key")
    }

    /// Record a role as assumed. Returns `false` if it already was.
    pub fn add_role(&mut self, role: &str) -> bool {
        if self.info.roles.iter().any(|r| r == role) {
            return false;
        }
        self.info.roles.push(role.to_string());
        true
    }

    pub fn remove_role(&mut self, role: &str) -> bool {
        let before = self.info.roles.len();
        self.info.roles.retain(|r| r != role);
        self.info.roles.len() != before
    }
}
