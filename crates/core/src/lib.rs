//! SIO Repository core library.
//!
//! Shared between the repository server and the `rep` client:
//!
//! - [`crypto`]: password-derived P-256 keys, ECDSA signatures, ECDH + HKDF
//!   session keys, AES-256-GCM and SHA-256 handles
//! - [`protocol`]: signed messages, encrypted session envelopes, request and
//!   response payloads, permission vocabulary
//! - [`error`]: [`CoreError`]

pub mod crypto;
pub mod error;
pub mod protocol;

pub use error::{CoreError, CoreResult};
