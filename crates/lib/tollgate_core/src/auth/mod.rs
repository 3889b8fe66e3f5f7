//! Authentication and credential lifecycle logic.
//!
//! Provides password hashing, access-token signing, opaque token generation,
//! and the lifecycle services that can be shared across `tollgate_api` and
//! `tollgate_gateway`.

pub mod jwt;
pub mod opaque;
pub mod password;
pub mod service;
pub mod settings;
pub mod users;
pub mod validation;

use thiserror::Error;

/// Authentication errors.
///
/// `NotFound` also masks "wrong password" and "unknown email" so callers
/// cannot enumerate accounts.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Expired: {0}")]
    Expired(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Email delivery failed: {0}")]
    Delivery(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
///
/// The header must be exactly two space-separated parts with the literal
/// `Bearer` scheme and a non-empty token.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    let scheme = parts.next()?;
    let token = parts.next()?;
    if scheme != "Bearer" || token.is_empty() || parts.next().is_some() {
        return None;
    }
    Some(token)
}
