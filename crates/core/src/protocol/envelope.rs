//! Encrypted, replay-protected envelopes for session traffic.
//!
//! The header (`msg_id`, `session_id`) is sent in clear but bound to the
//! ciphertext as AES-GCM associated data. Its canonical JSON form is the
//! struct serialization below, identical on both ends.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::crypto::aead;
use crate::error::CoreResult;

/// Authenticated but unencrypted part of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    /// Strictly increasing message counter for the session.
    pub msg_id: u64,

    /// Session identifier.
    pub session_id: String,
}

impl EnvelopeHeader {
    pub fn new(session_id: impl Into<String>, msg_id: u64) -> Self {
        Self {
            msg_id,
            session_id: session_id.into(),
        }
    }

    fn aad(&self) -> CoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Hex-encoded nonce and ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    pub nonce: String,
    pub ciphertext: String,
}

/// Body of every session request and response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEnvelope {
    pub associated_data: EnvelopeHeader,
    pub encrypted_data: EncryptedData,
}

impl SessionEnvelope {
    /// Encrypt `payload` as JSON under `key`, bound to `header`.
    pub fn seal<T: Serialize>(key: &[u8], header: EnvelopeHeader, payload: &T) -> CoreResult<Self> {
        let plaintext = serde_json::to_vec(payload)?;
        let (nonce, ciphertext) = aead::encrypt(key, &plaintext, Some(&header.aad()?))?;

        Ok(Self {
            associated_data: header,
            encrypted_data: EncryptedData {
                nonce: hex::encode(nonce),
                ciphertext: hex::encode(ciphertext),
            },
        })
    }

    /// Authenticate and decrypt the payload.
    pub fn open<T: DeserializeOwned>(&self, key: &[u8]) -> CoreResult<T> {
        let nonce = hex::decode(&self.encrypted_data.nonce)?;
        let ciphertext = hex::decode(&self.encrypted_data.ciphertext)?;
        let plaintext = aead::decrypt(
            key,
            &nonce,
            &ciphertext,
            Some(&self.associated_data.aad()?),
        )?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    pub fn session_id(&self) -> &str {
        &self.associated_data.session_id
    }

    pub fn msg_id(&self) -> u64 {
        self.associated_data.msg_id
    }
}
