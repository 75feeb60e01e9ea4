//! PostgreSQL persistence for organization aggregates, using SQLx.

pub mod connect;
pub mod models;
pub mod queries;

pub use connect::{connect, DbPool};
