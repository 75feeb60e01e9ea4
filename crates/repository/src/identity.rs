//! Long-term signing identity of the repository.
//!
//! Anonymous responses are signed with this key so clients holding the
//! published public key (`REP_PUB_KEY`) can trust them.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sio_core::crypto::{
    generate_secret_key, public_key_to_pem, secret_key_from_pem, secret_key_to_pem, PublicKey,
    SecretKey,
};
use sio_core::protocol::SignedMessage;

use crate::error::{AppError, AppResult};

/// The repository's ECDSA P-256 key pair.
#[derive(Clone)]
pub struct ServerIdentity {
    secret: SecretKey,
    public_pem: String,
}

impl ServerIdentity {
    pub fn new(secret: SecretKey) -> AppResult<Self> {
        let public_pem = public_key_to_pem(&secret.public_key())?;
        Ok(Self { secret, public_pem })
    }

    /// Fresh random identity, not persisted.
    pub fn generate() -> AppResult<Self> {
        Self::new(generate_secret_key())
    }

    /// Load the key from `path`, creating it (and `<path>.pub`) when missing.
    pub fn load_or_create(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            let pem = std::fs::read_to_string(path)?;
            let identity = Self::new(secret_key_from_pem(&pem)?)?;
            tracing::info!(path = %path.display(), "Loaded repository key");
            return Ok(identity);
        }

        let identity = Self::generate()?;
        identity.write(path)?;
        tracing::warn!(
            path = %path.display(),
            public_key = %public_key_path(path).display(),
            "Repository key not found, generated a new one"
        );
        Ok(identity)
    }

    /// Write the private key to `path` and the public key to `<path>.pub`.
    pub fn write(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let pem = secret_key_to_pem(&self.secret)?;
        std::fs::write(path, pem)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::write(public_key_path(path), &self.public_pem)?;
        Ok(())
    }

    pub fn public_key(&self) -> PublicKey {
        self.secret.public_key()
    }

    pub fn public_key_pem(&self) -> &str {
        &self.public_pem
    }

    /// Sign a response payload.
    pub fn sign<T: Serialize>(&self, payload: &T) -> AppResult<SignedMessage> {
        SignedMessage::sign(&self.secret, payload)
            .map_err(|e| AppError::Internal(format!("Failed to sign response: {}", e)))
    }
}

/// Path of the public key written beside a private key file.
pub fn public_key_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".pub");
    PathBuf::from(name)
}
