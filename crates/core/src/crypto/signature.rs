//! ECDSA P-256 / SHA-256 signatures, hex encoded on the wire.

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::{PublicKey, SecretKey};

use crate::error::{CoreError, CoreResult};

/// Sign `message` and return the signature as hex.
pub fn sign(key: &SecretKey, message: &[u8]) -> String {
    let signing_key = SigningKey::from(key);
    let signature: Signature = signing_key.sign(message);
    hex::encode(signature.to_bytes())
}

/// Verify a hex signature over `message`.
pub fn verify(key: &PublicKey, message: &[u8], signature_hex: &str) -> CoreResult<()> {
    let bytes = hex::decode(signature_hex)?;
    let signature = Signature::from_slice(&bytes).map_err(|_| CoreError::BadSignature)?;
    VerifyingKey::from(key)
        .verify(message, &signature)
        .map_err(|_| CoreError::BadSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::generate_secret_key;

    #[test]
    fn test_sign_verify() {
        let key = generate_secret_key();
        let sig = sign(&key, b"payload");
        assert!(verify(&key.public_key(), b"payload", &sig).is_ok());
    }

    #[test]
    fn test_verify_rejects_other_message_and_key() {
        let key = generate_secret_key();
        let other = generate_secret_key();
        let sig = sign(&key, b"payload");

        assert!(matches!(
            verify(&key.public_key(), b"payload!", &sig),
            Err(CoreError::BadSignature)
        ));
        assert!(verify(&other.public_key(), b"payload", &sig).is_err());
    }

    #[test]
    fn test_verify_rejects_malformed_signature() {
        let key = generate_secret_key();
        assert!(matches!(
            verify(&key.public_key(), b"payload", "not-hex"),
            Err(CoreError::Encoding(_))
        ));
        assert!(matches!(
            verify(&key.public_key(), b"payload", "abcd"),
            Err(CoreError::BadSignature)
        ));
    }
}
