//! Ephemeral ECDH key agreement for session establishment.
//!
//! Both sides generate an ephemeral P-256 key, exchange the public halves as
//! PEM, and expand the shared secret with HKDF-SHA-256 into a 32-byte
//! AES-256-GCM session key.

use hkdf::Hkdf;
use p256::ecdh::EphemeralSecret;
use rand::rngs::OsRng;
use sha2::Sha256;

use crate::crypto::keys::{public_key_from_pem, public_key_to_pem};
use crate::error::{CoreError, CoreResult};

/// HKDF info string binding the derived key to the handshake.
pub const HANDSHAKE_INFO: &[u8] = b"handshake data";

/// Length of a derived session key in bytes.
pub const SESSION_KEY_LEN: usize = 32;

/// Symmetric key shared by client and server for one session.
pub type SessionKey = [u8; SESSION_KEY_LEN];

/// One side of an ephemeral key exchange.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public_pem: String,
}

impl EphemeralKeyPair {
    /// Generate a fresh ephemeral key pair.
    pub fn generate() -> CoreResult<Self> {
        let secret = EphemeralSecret::random(&mut OsRng);
        let public_pem = public_key_to_pem(&secret.public_key())?;
        Ok(Self { secret, public_pem })
    }

    /// Public half as SPKI PEM, ready to send to the peer.
    pub fn public_pem(&self) -> &str {
        &self.public_pem
    }

    /// Combine with the peer's public key and derive the session key.
    pub fn derive_session_key(&self, peer_public_pem: &str) -> CoreResult<SessionKey> {
        let peer = public_key_from_pem(peer_public_pem)?;
        let shared = self.secret.diffie_hellman(&peer);

        let hk = Hkdf::<Sha256>::new(None, shared.raw_secret_bytes().as_slice());
        let mut key = [0u8; SESSION_KEY_LEN];
        hk.expand(HANDSHAKE_INFO, &mut key)
            .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
        Ok(key)
    }
}

/// Parse a hex-encoded session key.
pub fn session_key_from_hex(key_hex: &str) -> CoreResult<SessionKey> {
    let bytes = hex::decode(key_hex)?;
    bytes.try_into().map_err(|v: Vec<u8>| {
        CoreError::InvalidKey(format!(
            "session key must be {} bytes, got {}",
            SESSION_KEY_LEN,
            v.len()
        ))
    })
}
