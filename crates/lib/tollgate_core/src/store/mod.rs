//! Credential persistence.
//!
//! `CredentialStore` owns users and every token record. Each operation is a
//! single transaction: whatever reads a token and flips its `consumed` flag
//! does so atomically, so two requests racing on the same token value yield
//! exactly one success.
//!
//! Token arguments are SHA-256 digests produced by
//! [`crate::auth::opaque::digest_token`]; plaintext tokens never reach the
//! store.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::AuthError;
use crate::models::auth::{Login, NewUser, ProfileUpdate, User, UserProfile};

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;

/// Purpose tag for single-use email tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenPurpose {
    Confirmation,
    Reset,
}

impl TokenPurpose {
    /// Value stored in `user_tokens.purpose`.
    pub fn code(self) -> i16 {
        match self {
            TokenPurpose::Confirmation => 1,
            TokenPurpose::Reset => 2,
        }
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a user and its confirmation token together. Returns the new
    /// user id. Fails with `Conflict` if the username or email is taken.
    async fn create_user(
        &self,
        user: &NewUser,
        confirm_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<i64, AuthError>;

    /// Consume an unconsumed confirmation token and mark its user confirmed.
    ///
    /// Expiry is not checked here: an unconsumed confirmation token stays
    /// usable past `expires_at`. Reset tokens are stricter.
    async fn consume_confirmation_token(&self, token: &str) -> Result<i64, AuthError>;

    /// Attach a new confirmation token to an unconfirmed user with `email`.
    /// Fails with `NotFound` if no such unconfirmed user exists.
    async fn issue_confirmation_token(
        &self,
        email: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<i64, AuthError>;

    /// Attach a reset token to the confirmed user with `email`.
    /// Fails with `NotFound` if no confirmed user matches.
    async fn issue_reset_token(
        &self,
        email: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<i64, AuthError>;

    /// Consume a reset token, replace the password digest, and consume every
    /// outstanding refresh token of the user. Requires the token to be both
    /// unconsumed (`NotFound` otherwise) and unexpired (`Expired` otherwise).
    async fn consume_reset_token(
        &self,
        token: &str,
        new_password_hash: &str,
    ) -> Result<i64, AuthError>;

    /// Look a user up by email or username plus password digest. A wrong
    /// password and an unknown user both yield `NotFound`.
    async fn find_by_credentials(
        &self,
        login: &Login,
        password_hash: &str,
    ) -> Result<User, AuthError>;

    /// Consume an unconsumed, unexpired refresh token and return its owner.
    async fn consume_refresh_token(&self, token: &str) -> Result<User, AuthError>;

    /// Store a refresh token. Other live tokens of the user stay valid.
    async fn store_refresh_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    /// Consume `old_token` and store `new_token` for the same user, in one
    /// transaction.
    async fn rotate_refresh_token(
        &self,
        old_token: &str,
        new_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<User, AuthError>;

    async fn find_profile(&self, username: &str) -> Result<UserProfile, AuthError>;

    /// Apply the provided profile fields. `NotFound` if the user is absent.
    async fn update_profile(&self, username: &str, update: &ProfileUpdate)
    -> Result<(), AuthError>;

    /// Replace the password digest if `old_password_hash` matches, and
    /// consume every outstanding refresh token of the user.
    async fn change_password(
        &self,
        user_id: i64,
        old_password_hash: &str,
        new_password_hash: &str,
    ) -> Result<(), AuthError>;
}
