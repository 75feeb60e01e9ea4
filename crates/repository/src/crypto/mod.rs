//! Cryptography for data the repository keeps at rest.
//!
//! Provides AES-GCM sealing of document file keys.

pub mod encryption;

pub use encryption::Encryptor;
