//! AES-256-GCM authenticated encryption.
//!
//! Used for session envelopes (with associated data) and for document file
//! blobs, which are stored as `nonce || ciphertext`.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::Rng;

use crate::error::{CoreError, CoreResult};

/// Nonce size for AES-GCM (96 bits / 12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Key size for AES-256 (256 bits / 32 bytes).
pub const KEY_SIZE: usize = 32;

/// Name recorded in document metadata for this algorithm.
pub const ALGORITHM: &str = "AES-GCM";

/// Generate a random 32-byte key.
pub fn generate_key() -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    rand::thread_rng().fill(&mut key[..]);
    key
}

fn cipher(key: &[u8]) -> CoreResult<Aes256Gcm> {
    if key.len() != KEY_SIZE {
        return Err(CoreError::InvalidKey(format!(
            "expected {} byte key, got {}",
            KEY_SIZE,
            key.len()
        )));
    }
    Aes256Gcm::new_from_slice(key).map_err(|e| CoreError::InvalidKey(e.to_string()))
}

/// Encrypt `plaintext`, authenticating `aad` alongside it.
///
/// Returns the random nonce and the ciphertext (tag appended).
pub fn encrypt(
    key: &[u8],
    plaintext: &[u8],
    aad: Option<&[u8]>,
) -> CoreResult<([u8; NONCE_SIZE], Vec<u8>)> {
    let cipher = cipher(key)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad: aad.unwrap_or_default(),
            },
        )
        .map_err(|e| CoreError::Encryption(e.to_string()))?;

    Ok((nonce_bytes, ciphertext))
}

/// Decrypt and authenticate.
pub fn decrypt(
    key: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
    aad: Option<&[u8]>,
) -> CoreResult<Vec<u8>> {
    if nonce.len() != NONCE_SIZE {
        return Err(CoreError::Encoding(format!(
            "nonce must be {} bytes, got {}",
            NONCE_SIZE,
            nonce.len()
        )));
    }

    cipher(key)?
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: aad.unwrap_or_default(),
            },
        )
        .map_err(|_| CoreError::InvalidTag)
}

/// Encrypt into a single `nonce || ciphertext` blob.
pub fn seal_blob(key: &[u8], plaintext: &[u8]) -> CoreResult<Vec<u8>> {
    let (nonce, ciphertext) = encrypt(key, plaintext, None)?;
    let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt a `nonce || ciphertext` blob.
pub fn open_blob(key: &[u8], blob: &[u8]) -> CoreResult<Vec<u8>> {
    if blob.len() < NONCE_SIZE {
        return Err(CoreError::Encoding(
            "ciphertext too short (missing nonce)".to_string(),
        ));
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_SIZE);
    decrypt(key, nonce, ciphertext, None)
}
