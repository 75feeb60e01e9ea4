//! Error types shared by the repository server and client.

use thiserror::Error;

/// Errors raised by cryptographic and protocol helpers.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Key material could not be parsed or derived.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Signature did not verify against the expected public key.
    #[error("Signature verification failed")]
    BadSignature,

    /// AEAD decryption failed (wrong key, tampered ciphertext or associated data).
    #[error("Decryption failed: invalid tag")]
    InvalidTag,

    /// Encryption failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Hex or base64 decoding error.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown permission, state or filter name.
    #[error("Unknown value: {0}")]
    UnknownValue(String),
}

impl From<hex::FromHexError> for CoreError {
    fn from(e: hex::FromHexError) -> Self {
        CoreError::Encoding(e.to_string())
    }
}

impl From<base64::DecodeError> for CoreError {
    fn from(e: base64::DecodeError) -> Self {
        CoreError::Encoding(e.to_string())
    }
}

/// Result alias using [`CoreError`].
pub type CoreResult<T> = Result<T, CoreError>;
