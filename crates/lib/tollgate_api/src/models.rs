//! Request and response bodies.

use serde::{Deserialize, Serialize};
use tollgate_core::models::auth::{Identity, TokenPair};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    /// Email address or username.
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmRequest {
    pub confirm_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmResetRequest {
    pub reset_token: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expire_in: i64,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expire_in: pair.expire_in,
        }
    }
}

/// `GET /auth/me` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub status: String,
    pub username: String,
}

/// `GET /auth/verify` body. `role` is the numeric role id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub id: i64,
    pub role: i32,
}

impl From<&Identity> for VerifyResponse {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.user_id,
            role: identity.role.id(),
        }
    }
}
