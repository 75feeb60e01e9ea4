//! Session layer: handshake-derived keys, encrypted envelopes and replay
//! protection.

mod extract;
mod registry;

pub use extract::{SessionReply, SessionRequest};
pub use registry::{Session, SessionContext, SessionRegistry};
