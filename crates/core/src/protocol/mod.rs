//! Wire protocol: signed messages, session envelopes and payloads.

pub mod envelope;
pub mod payloads;
pub mod permission;
pub mod signed;

pub use envelope::{EncryptedData, EnvelopeHeader, SessionEnvelope};
pub use payloads::*;
pub use permission::{
    AclOperation, ActivationState, DateFilter, Permission, RoleState, SubjectState, DATE_FORMAT,
};
pub use signed::SignedMessage;

/// HTTP status the repository uses for session-layer failures
/// (unknown or expired session, bad tag, replayed message).
pub const SESSION_ERROR_STATUS: u16 = 499;

/// Prefix of every versioned API route.
pub const API_PREFIX: &str = "/api/v1";
