//! Access token issuance and verification (HS256 JWT).
//!
//! The payload carries `user_id`, `user_name`, `user_role`, and `expire_at`
//! (unix seconds). Verification pins the algorithm to HS256 and re-checks
//! `expire_at` itself, because a valid signature says nothing about expiry.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use super::opaque;
use super::settings::AuthSettings;
use crate::models::auth::{Identity, Role, TokenClaims};

/// Access token verification failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("invalid token signature")]
    InvalidSignature,

    #[error("malformed token")]
    Malformed,

    #[error("token expired")]
    Expired,

    #[error("token encode: {0}")]
    Encode(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            // A token signed with another algorithm is treated like a forged one.
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

/// A freshly signed access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signed-claims and opaque token capability.
pub trait TokenCodec: Send + Sync {
    /// Sign an access token for the given identity.
    fn issue(&self, user_id: i64, user_name: &str, role: Role) -> Result<IssuedToken, TokenError>;

    /// Verify signature, algorithm, and embedded expiry.
    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError>;

    /// Configured access token lifetime.
    fn access_ttl(&self) -> Duration;

    /// Generate an opaque URL-safe token from `byte_len` random bytes.
    fn generate(&self, byte_len: usize) -> String {
        opaque::generate_token(byte_len)
    }
}

/// HS256 codec over a shared secret.
#[derive(Clone)]
pub struct JwtCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtCodec {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry lives in `expire_at`, not the registered `exp` claim.
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_aud = false;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(settings.jwt_secret.as_bytes(), settings.access_ttl)
    }

    /// Sign a token as if issued at `now`.
    pub fn issue_at(
        &self,
        user_id: i64,
        user_name: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = now + self.ttl;
        let claims = TokenClaims {
            user_id,
            user_name: user_name.to_string(),
            user_role: role.name().to_string(),
            expire_at: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Verify a token against the clock reading `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let claims = decode::<TokenClaims>(token, &self.decoding, &self.validation)?.claims;
        if claims.expire_at <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

impl fmt::Debug for JwtCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec for JwtCodec {
    fn issue(&self, user_id: i64, user_name: &str, role: Role) -> Result<IssuedToken, TokenError> {
        self.issue_at(user_id, user_name, role, Utc::now())
    }

    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    fn access_ttl(&self) -> Duration {
        self.ttl
    }
}

/// Verify an access token and resolve its role claim against the taxonomy.
///
/// Pure signature + expiry check; never touches the credential store.
pub fn verify_identity(codec: &dyn TokenCodec, token: &str) -> Result<Identity, TokenError> {
    let claims = codec.verify(token)?;
    let role = Role::from_name(&claims.user_role).ok_or(TokenError::Malformed)?;
    Ok(Identity {
        user_id: claims.user_id,
        user_name: claims.user_name,
        role,
    })
}
