//! Document keys at rest.
//!
//! Clients hand over the AES key of every document they upload. The key is
//! sealed under the repository master key (`SIO_ENCRYPTION_KEY`) with the
//! document handle as associated data, so a sealed key copied onto another
//! document record does not open. Stored form: base64 of `nonce || ciphertext`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sio_core::crypto::aead::{self, KEY_SIZE, NONCE_SIZE};

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct Encryptor {
    master_key: [u8; KEY_SIZE],
}

impl Encryptor {
    /// Build from the base64 master key found in configuration.
    pub fn from_base64(master_key: &str) -> AppResult<Self> {
        let bytes = BASE64
            .decode(master_key.trim())
            .map_err(|e| AppError::Config(format!("Master key is not base64: {}", e)))?;
        let master_key: [u8; KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| {
            AppError::Config(format!(
                "Master key must be {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self { master_key })
    }

    /// Fresh random master key, base64 encoded, for `.env` files.
    pub fn generate_key_base64() -> String {
        BASE64.encode(aead::generate_key())
    }

    /// Seal a hex document key for storage.
    pub fn seal_key(&self, key_hex: &str, document_handle: &str) -> AppResult<String> {
        let key = hex::decode(key_hex)
            .map_err(|e| AppError::BadRequest(format!("Document key is not hex: {}", e)))?;
        if key.len() != KEY_SIZE {
            return Err(AppError::BadRequest(format!(
                "Document key must be {} bytes, got {}",
                KEY_SIZE,
                key.len()
            )));
        }

        let (nonce, ciphertext) =
            aead::encrypt(&self.master_key, &key, Some(document_handle.as_bytes()))?;
        Ok(BASE64.encode([nonce.as_slice(), &ciphertext].concat()))
    }

    /// Recover the hex document key sealed for `document_handle`.
    pub fn open_key(&self, sealed: &str, document_handle: &str) -> AppResult<String> {
        let blob = BASE64
            .decode(sealed)
            .map_err(|e| AppError::Encryption(format!("Sealed key is not base64: {}", e)))?;
        if blob.len() < NONCE_SIZE {
            return Err(AppError::Encryption("Sealed key is truncated".to_string()));
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_SIZE);
        let key = aead::decrypt(
            &self.master_key,
            nonce,
            ciphertext,
            Some(document_handle.as_bytes()),
        )?;
        Ok(hex::encode(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HANDLE: &str = "5d41402abc4b2a76b9719d911017c592";

    fn encryptor() -> Encryptor {
        Encryptor::from_base64(&Encryptor::generate_key_base64()).unwrap()
    }

    #[test]
    fn test_seal_and_open_document_key() {
        let encryptor = encryptor();
        let key_hex = hex::encode([7u8; KEY_SIZE]);

        let sealed = encryptor.seal_key(&key_hex, HANDLE).unwrap();
        assert!(!sealed.contains(&key_hex));
        assert_eq!(encryptor.open_key(&sealed, HANDLE).unwrap(), key_hex);
    }

    #[test]
    fn test_sealed_key_is_bound_to_its_document() {
        let encryptor = encryptor();
        let sealed = encryptor.seal_key(&hex::encode([7u8; KEY_SIZE]), HANDLE).unwrap();
        assert!(matches!(
            encryptor.open_key(&sealed, "another-document"),
            Err(AppError::Encryption(_))
        ));
    }

    #[test]
    fn test_seal_rejects_bad_keys() {
        let encryptor = encryptor();
        assert!(matches!(
            encryptor.seal_key("zz", HANDLE),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            encryptor.seal_key(&hex::encode([1u8; 16]), HANDLE),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_invalid_master_key() {
        assert!(Encryptor::from_base64(&BASE64.encode([0u8; 16])).is_err());
        assert!(Encryptor::from_base64("not-valid-base64!!!").is_err());
    }

    #[test]
    fn test_open_with_other_master_key_fails() {
        let sealed = encryptor()
            .seal_key(&hex::encode([3u8; KEY_SIZE]), HANDLE)
            .unwrap();
        assert!(encryptor().open_key(&sealed, HANDLE).is_err());
        assert!(encryptor().open_key("AAAA", HANDLE).is_err());
    }
}
