//! Commands that never contact the repository.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use sio_core::crypto::{aead, derive_subject_key, file_handle, public_key_to_pem};

/// The part of document metadata needed to decrypt its file.
#[derive(Debug, Clone, Deserialize)]
pub struct EncryptionMetadata {
    /// Hex of the file key.
    pub key: String,
    pub alg: String,
}

/// SPKI PEM of the public key derived from `password`.
pub fn subject_public_key(password: &str) -> Result<String> {
    let secret = derive_subject_key(password)?;
    Ok(public_key_to_pem(&secret.public_key())?)
}

/// Write the public key derived from `password` to `credentials_file`.
pub fn subject_credentials(password: &str, credentials_file: &Path) -> Result<String> {
    let pem = subject_public_key(password)?;
    fs::write(credentials_file, &pem).with_context(|| {
        format!("Failed to write credentials file: {}", credentials_file.display())
    })?;
    tracing::debug!(path = %credentials_file.display(), "Public key stored in credentials file");
    Ok(pem)
}

/// Decrypt a stored `nonce || ciphertext` blob.
pub fn decrypt_blob(metadata: &EncryptionMetadata, blob: &[u8]) -> Result<Vec<u8>> {
    if metadata.alg != aead::ALGORITHM {
        anyhow::bail!("Unsupported encryption algorithm: {}", metadata.alg);
    }
    let key = hex::decode(&metadata.key).context("Document key is not hex")?;
    aead::open_blob(&key, blob).context("Failed to decrypt file")
}

/// Decrypt and check the plaintext digest against the file handle.
pub fn decrypt_document(metadata: &EncryptionMetadata, blob: &[u8], expected_handle: &str) -> Result<Vec<u8>> {
    let plaintext = decrypt_blob(metadata, blob)?;
    if file_handle(&plaintext) != expected_handle {
        anyhow::bail!("Failed to verify file handle: content digest does not match");
    }
    Ok(plaintext)
}

/// `rep decrypt-file <encrypted file> <metadata json>`.
pub fn decrypt_file(encrypted_file: &Path, metadata_file: &Path) -> Result<Vec<u8>> {
    let metadata: EncryptionMetadata = serde_json::from_str(
        &fs::read_to_string(metadata_file).context("Failed to read encryption metadata file")?,
    )
    .context("Invalid encryption metadata")?;
    let blob = fs::read(encrypted_file)
        .with_context(|| format!("Failed to read encrypted file: {}", encrypted_file.display()))?;
    tracing::debug!(bytes = blob.len(), "Encrypted file read");
    decrypt_blob(&metadata, &blob)
}
