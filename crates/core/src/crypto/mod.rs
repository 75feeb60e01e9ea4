//! Cryptographic building blocks shared by the repository and its client.

pub mod aead;
pub mod digest;
pub mod exchange;
pub mod keys;
pub mod signature;

pub use digest::{document_handle, file_handle, is_valid_handle, sha256_hex};
pub use exchange::{session_key_from_hex, EphemeralKeyPair, SessionKey};
pub use keys::{
    derive_subject_key, generate_secret_key, normalize_public_key_pem, public_key_from_pem,
    public_key_to_pem, secret_key_from_pem, secret_key_to_pem,
};
pub use p256::{PublicKey, SecretKey};
