//! Immutable authentication settings, built once at startup and handed to
//! every component constructor.

use std::fmt;

use chrono::Duration;

use super::AuthError;
use super::opaque::MIN_TOKEN_BYTES;

/// Access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;

/// Refresh token lifetime: 30 days.
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Confirmation and reset token lifetime: 2 hours.
pub const DEFAULT_EMAIL_TOKEN_TTL_SECS: i64 = 2 * 60 * 60;

/// Opaque token length in random bytes.
pub const DEFAULT_TOKEN_BYTES: usize = 32;

pub const DEFAULT_CONFIRM_LINK_BASE: &str = "http://localhost:3000/verifyemail/";
pub const DEFAULT_RESET_LINK_BASE: &str = "http://localhost:3000/reset-password/";

#[derive(Clone)]
pub struct AuthSettings {
    /// HS256 signing secret for access tokens.
    pub jwt_secret: String,
    /// Server-wide password salt.
    pub password_salt: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub confirm_ttl: Duration,
    pub reset_ttl: Duration,
    /// Random bytes per confirmation/reset/refresh token.
    pub token_bytes: usize,
    /// Prefix the confirmation token is appended to in outgoing email.
    pub confirm_link_base: String,
    /// Prefix the reset token is appended to in outgoing email.
    pub reset_link_base: String,
}

impl AuthSettings {
    /// Settings with the given secrets and default lifetimes.
    pub fn new(jwt_secret: impl Into<String>, password_salt: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            password_salt: password_salt.into(),
            access_ttl: Duration::seconds(DEFAULT_ACCESS_TTL_SECS),
            refresh_ttl: Duration::seconds(DEFAULT_REFRESH_TTL_SECS),
            confirm_ttl: Duration::seconds(DEFAULT_EMAIL_TOKEN_TTL_SECS),
            reset_ttl: Duration::seconds(DEFAULT_EMAIL_TOKEN_TTL_SECS),
            token_bytes: DEFAULT_TOKEN_BYTES,
            confirm_link_base: DEFAULT_CONFIRM_LINK_BASE.to_string(),
            reset_link_base: DEFAULT_RESET_LINK_BASE.to_string(),
        }
    }

    #[must_use]
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_confirm_ttl(mut self, ttl: Duration) -> Self {
        self.confirm_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_reset_ttl(mut self, ttl: Duration) -> Self {
        self.reset_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_token_bytes(mut self, bytes: usize) -> Self {
        self.token_bytes = bytes;
        self
    }

    #[must_use]
    pub fn with_links(mut self, confirm_base: impl Into<String>, reset_base: impl Into<String>) -> Self {
        self.confirm_link_base = confirm_base.into();
        self.reset_link_base = reset_base.into();
        self
    }

    /// Reject settings the lifecycle cannot safely run with.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.jwt_secret.is_empty() {
            return Err(AuthError::ValidationError("empty signing key".into()));
        }
        if self.password_salt.is_empty() {
            return Err(AuthError::ValidationError("empty password salt".into()));
        }
        if self.token_bytes < MIN_TOKEN_BYTES {
            return Err(AuthError::ValidationError(format!(
                "token length must be at least {MIN_TOKEN_BYTES} bytes"
            )));
        }
        for (name, ttl) in [
            ("access", self.access_ttl),
            ("refresh", self.refresh_ttl),
            ("confirmation", self.confirm_ttl),
            ("reset", self.reset_ttl),
        ] {
            if ttl <= Duration::zero() {
                return Err(AuthError::ValidationError(format!(
                    "{name} token lifetime must be positive"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &"<redacted>")
            .field("password_salt", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("confirm_ttl", &self.confirm_ttl)
            .field("reset_ttl", &self.reset_ttl)
            .field("token_bytes", &self.token_bytes)
            .field("confirm_link_base", &self.confirm_link_base)
            .field("reset_link_base", &self.reset_link_base)
            .finish()
    }
}
