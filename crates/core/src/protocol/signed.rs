//! Signed messages for the unauthenticated part of the API.
//!
//! The associated data travels as the exact JSON text that was signed, so
//! the receiver verifies the bytes it got rather than a re-serialization.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::crypto::signature;
use crate::crypto::{PublicKey, SecretKey};
use crate::error::CoreResult;

/// JSON payload plus a signature over its text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMessage {
    /// JSON text of the signed payload.
    pub associated_data: String,

    /// Hex-encoded ECDSA P-256 signature over `associated_data`.
    pub signature: String,
}

impl SignedMessage {
    /// Serialize `payload` and sign it.
    pub fn sign<T: Serialize>(key: &SecretKey, payload: &T) -> CoreResult<Self> {
        let associated_data = serde_json::to_string(payload)?;
        let signature = signature::sign(key, associated_data.as_bytes());
        Ok(Self {
            associated_data,
            signature,
        })
    }

    /// Verify the signature, then parse the payload.
    pub fn open<T: DeserializeOwned>(&self, key: &PublicKey) -> CoreResult<T> {
        signature::verify(key, self.associated_data.as_bytes(), &self.signature)?;
        Ok(serde_json::from_str(&self.associated_data)?)
    }
}
