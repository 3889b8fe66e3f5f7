//! # tollgate_core
//!
//! Credential lifecycle domain logic for Tollgate: password hashing, token
//! issuance and verification, credential persistence, and the sign-up /
//! sign-in / confirmation / reset / refresh flows built on top of them.

pub mod auth;
pub mod email;
pub mod migrate;
pub mod models;
pub mod store;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
