//! Client library behind the `rep` command.
//!
//! - [`state`]: repository address and public key, persisted between runs
//! - [`session_file`]: session context written by `rep create-session`
//! - [`client`]: signed anonymous calls and encrypted session calls
//! - [`local`]: credential generation and file decryption

pub mod client;
pub mod local;
pub mod session_file;
pub mod state;

pub use client::RepositoryClient;
pub use session_file::{SessionFile, SessionInfo};
pub use state::ClientState;
