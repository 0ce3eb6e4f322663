//! CLI command implementations.

pub mod provision;
pub mod route;
pub mod version;
