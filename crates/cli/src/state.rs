//! Persistent client state, `~/.sio/state.json`.
//!
//! Precedence, lowest to highest: the state file, the `REP_ADDRESS` and
//! `REP_PUB_KEY` environment variables, then the `-r` and `-k` flags. The
//! merged result is written back so later runs can omit them.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sio_core::crypto::{public_key_from_pem, PublicKey};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientState {
    /// Repository base address, e.g. `http://localhost:5000`.
    #[serde(rename = "REP_ADDRESS", default, skip_serializing_if = "Option::is_none")]
    pub rep_address: Option<String>,

    /// Repository public key (SPKI PEM text, not a path).
    #[serde(rename = "REP_PUB_KEY", default, skip_serializing_if = "Option::is_none")]
    pub rep_pub_key: Option<String>,
}

impl ClientState {
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".sio").join("state.json"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No state file");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write state file: {}", path.display()))
    }

    /// Apply environment overrides. `REP_PUB_KEY` names a PEM file; a path
    /// that does not exist is ignored.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(address) = env("REP_ADDRESS").filter(|a| !a.is_empty()) {
            tracing::debug!(address = %address, "REP_ADDRESS from environment");
            self.rep_address = Some(address);
        }
        if let Some(key_path) = env("REP_PUB_KEY").filter(|k| !k.is_empty()) {
            let key_path = PathBuf::from(key_path);
            if key_path.is_file() {
                self.rep_pub_key = Some(read_key(&key_path)?);
                tracing::debug!(path = %key_path.display(), "REP_PUB_KEY from environment");
            } else {
                tracing::warn!(path = %key_path.display(), "REP_PUB_KEY does not name a file, ignoring");
            }
        }
        Ok(())
    }

    /// Apply command-line overrides. Unlike the environment, a bad `-k`
    /// path is an error.
    pub fn apply_args(&mut self, repo: Option<String>, key: Option<&Path>) -> Result<()> {
        if let Some(key_path) = key {
            if !key_path.is_file() {
                anyhow::bail!("Key file not found or invalid: {}", key_path.display());
            }
            self.rep_pub_key = Some(read_key(key_path)?);
            tracing::info!("Overriding REP_PUB_KEY from command line");
        }
        if let Some(address) = repo {
            self.rep_address = Some(address);
            tracing::info!("Overriding REP_ADDRESS from command line");
        }
        Ok(())
    }

    pub fn address(&self) -> Result<&str> {
        self.rep_address
            .as_deref()
            .context("Repository address unknown: set REP_ADDRESS or pass -r")
    }

    pub fn repository_key(&self) -> Result<PublicKey> {
        let pem = self
            .rep_pub_key
            .as_deref()
            .context("Repository public key unknown: set REP_PUB_KEY or pass -k")?;
        public_key_from_pem(pem).context("Repository public key is not a valid PEM key")
    }
}

fn read_key(path: &Path) -> Result<String> {
    let pem = fs::read_to_string(path)
        .with_context(|| format!("Failed to read key file: {}", path.display()))?;
    public_key_from_pem(&pem)
        .with_context(|| format!("Not a PEM public key: {}", path.display()))?;
    Ok(pem)
}
