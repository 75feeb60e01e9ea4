//! Configuration for the SIO Repository server.
//!
//! Values come from environment variables through `envy`; `main` loads a
//! `.env` file with `dotenvy` first.

mod app;
mod database;
mod mongo;

pub use app::{AppConfig, LogFormat, StoreKind, DEFAULT_ENCRYPTION_KEY};
pub use database::DatabaseConfig;
pub use mongo::MongoConfig;
