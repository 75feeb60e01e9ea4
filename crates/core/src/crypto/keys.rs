//! P-256 key material: password-derived subject keys and PEM encoding.
//!
//! Subjects never store a private key. The same password always derives the
//! same key, and only the public half (SPKI PEM) is handed to the repository.

use hkdf::Hkdf;
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use sha2::Sha256;

use crate::error::{CoreError, CoreResult};

const CREDENTIALS_SALT: &[u8] = b"sio-subject-credentials";

/// Derive a subject's private key from its password.
///
/// Out-of-range scalars are vanishingly rare; the counter in the HKDF info
/// string moves on to the next candidate when one is hit.
pub fn derive_subject_key(password: &str) -> CoreResult<SecretKey> {
    if password.is_empty() {
        return Err(CoreError::InvalidKey("password must not be empty".to_string()));
    }

    let hk = Hkdf::<Sha256>::new(Some(CREDENTIALS_SALT), password.as_bytes());
    for counter in 0u8..=u8::MAX {
        let mut candidate = [0u8; 32];
        hk.expand(&[b"p256-scalar:".as_slice(), &[counter]].concat(), &mut candidate)
            .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
        if let Ok(key) = SecretKey::from_slice(&candidate) {
            return Ok(key);
        }
    }

    Err(CoreError::InvalidKey(
        "could not derive a valid scalar from password".to_string(),
    ))
}

/// Generate a random P-256 private key.
pub fn generate_secret_key() -> SecretKey {
    SecretKey::random(&mut OsRng)
}

/// Encode a public key as SPKI PEM.
pub fn public_key_to_pem(key: &PublicKey) -> CoreResult<String> {
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|e| CoreError::InvalidKey(e.to_string()))
}

/// Parse an SPKI PEM public key.
pub fn public_key_from_pem(pem: &str) -> CoreResult<PublicKey> {
    PublicKey::from_public_key_pem(pem.trim()).map_err(|e| CoreError::InvalidKey(e.to_string()))
}

/// Re-encode a PEM public key so equal keys compare equal as strings.
pub fn normalize_public_key_pem(pem: &str) -> CoreResult<String> {
    public_key_to_pem(&public_key_from_pem(pem)?)
}

/// Encode a private key as PKCS#8 PEM.
pub fn secret_key_to_pem(key: &SecretKey) -> CoreResult<String> {
    key.to_pkcs8_pem(LineEnding::LF)
        .map(|pem| pem.to_string())
        .map_err(|e| CoreError::InvalidKey(e.to_string()))
}

/// Parse a PKCS#8 PEM private key.
pub fn secret_key_from_pem(pem: &str) -> CoreResult<SecretKey> {
    SecretKey::from_pkcs8_pem(pem.trim()).map_err(|e| CoreError::InvalidKey(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_derivation_is_deterministic() {
        let a = derive_subject_key("correct horse").unwrap();
        let b = derive_subject_key("correct horse").unwrap();
        let c = derive_subject_key("battery staple").unwrap();

        assert_eq!(a.to_bytes(), b.to_bytes());
        assert_ne!(a.to_bytes(), c.to_bytes());
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(derive_subject_key("").is_err());
    }

    #[test]
    fn test_public_pem_roundtrip() {
        let secret = generate_secret_key();
        let pem = public_key_to_pem(&secret.public_key()).unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));

        let parsed = public_key_from_pem(&pem).unwrap();
        assert_eq!(parsed, secret.public_key());
        assert_eq!(normalize_public_key_pem(&format!("\n{}\n", pem)).unwrap(), pem);
    }

    #[test]
    fn test_secret_pem_roundtrip() {
        let secret = generate_secret_key();
        let pem = secret_key_to_pem(&secret).unwrap();
        let parsed = secret_key_from_pem(&pem).unwrap();
        assert_eq!(parsed.to_bytes(), secret.to_bytes());
    }

    #[test]
    fn test_garbage_pem_rejected() {
        assert!(public_key_from_pem("not a key").is_err());
        assert!(secret_key_from_pem("not a key").is_err());
    }
}
