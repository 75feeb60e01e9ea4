//! HTTP handlers for the SIO Repository API.
//!
//! Anonymous endpoints answer with signed JSON (or plain JSON for listings
//! and health); session endpoints take and return [`SessionEnvelope`]s.
//!
//! [`SessionEnvelope`]: sio_core::protocol::SessionEnvelope

pub mod auth;
pub mod documents;
pub mod files;
pub mod health;
pub mod organizations;
pub mod sessions;

pub use health::{api_health, health_check};
