//! Row types for repository tables.

pub mod organization;

pub use organization::*;
