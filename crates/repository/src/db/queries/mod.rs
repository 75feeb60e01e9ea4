//! Database queries for the repository.

pub mod organization;
