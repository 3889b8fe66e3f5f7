//! Identity resolution and query rewriting.
//!
//! Client-supplied identity fields are always removed before the gateway
//! sets its own, on every forwarded request. A caller whose token cannot be
//! verified is forwarded as anonymous (`user_role=0`) rather than rejected;
//! downstream services make the authorization decision.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use serde::Deserialize;
use thiserror::Error;
use tollgate_core::auth::jwt::{JwtCodec, TokenCodec, verify_identity};
use tollgate_core::auth::parse_bearer;
use tollgate_core::models::auth::Role;
use url::Url;
use url::form_urlencoded;

pub const USER_ID: &str = "user_id";
pub const USER_ROLE: &str = "user_role";
pub const USER_ID_TO_GET: &str = "user_id_to_get";

const IDENTITY_FIELDS: &[&str] = &[USER_ID, USER_ROLE, USER_ID_TO_GET];

/// Identity the gateway vouches for downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ResolvedIdentity {
    #[serde(rename = "id")]
    pub user_id: i64,
    #[serde(rename = "role")]
    pub role_id: i32,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("missing or malformed bearer header")]
    MissingBearer,

    #[error("token rejected: {0}")]
    Rejected(String),

    #[error("verifier unavailable: {0}")]
    Unavailable(String),
}

/// Turns request headers into a verified identity.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Result<ResolvedIdentity, ResolveError>;
}

fn bearer(headers: &HeaderMap) -> Result<&str, ResolveError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_bearer)
        .ok_or(ResolveError::MissingBearer)
}

/// Verifies access tokens in-process with the shared signing key.
#[derive(Clone)]
pub struct LocalResolver {
    codec: Arc<dyn TokenCodec>,
}

impl LocalResolver {
    pub fn new(codec: Arc<dyn TokenCodec>) -> Self {
        Self { codec }
    }

    /// Resolver over an HS256 codec with `secret`. The TTL is unused for
    /// verification.
    pub fn from_secret(secret: &str) -> Self {
        Self::new(Arc::new(JwtCodec::new(
            secret.as_bytes(),
            chrono::Duration::zero(),
        )))
    }
}

#[async_trait]
impl IdentityResolver for LocalResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<ResolvedIdentity, ResolveError> {
        let token = bearer(headers)?;
        let identity = verify_identity(self.codec.as_ref(), token)
            .map_err(|e| ResolveError::Rejected(e.to_string()))?;
        Ok(ResolvedIdentity {
            user_id: identity.user_id,
            role_id: identity.role.id(),
        })
    }
}

/// Asks the auth service to verify the caller's bearer token.
#[derive(Clone, Debug)]
pub struct RemoteResolver {
    client: reqwest::Client,
    verify_url: Url,
}

impl RemoteResolver {
    pub const VERIFY_PATH: &'static str = "/api/v1/auth/verify";

    pub fn new(client: reqwest::Client, auth_service_url: &Url) -> Self {
        let mut verify_url = auth_service_url.clone();
        verify_url.set_path(Self::VERIFY_PATH);
        verify_url.set_query(None);
        Self { client, verify_url }
    }
}

#[async_trait]
impl IdentityResolver for RemoteResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<ResolvedIdentity, ResolveError> {
        let token = bearer(headers)?;
        let resp = self
            .client
            .get(self.verify_url.clone())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ResolveError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ResolveError::Rejected(format!(
                "auth service answered {}",
                resp.status()
            )));
        }
        let identity: ResolvedIdentity = resp
            .json()
            .await
            .map_err(|e| ResolveError::Unavailable(e.to_string()))?;
        if Role::from_id(identity.role_id).is_none() {
            return Err(ResolveError::Rejected(format!(
                "unknown role id {}",
                identity.role_id
            )));
        }
        Ok(identity)
    }
}

fn is_identity_field(key: &str) -> bool {
    IDENTITY_FIELDS.contains(&key)
}

/// Query pairs of `raw` with every identity field removed.
fn stripped_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    form_urlencoded::parse(raw.unwrap_or_default().as_bytes())
        .filter(|(key, _)| !is_identity_field(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn encode(pairs: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// Remove identity fields and leave everything else as sent.
pub fn strip_identity(raw: Option<&str>) -> String {
    encode(&stripped_pairs(raw))
}

/// Remove identity fields, then set the server-derived ones.
///
/// `None` forwards the caller as anonymous with only `user_role=0`.
pub fn rewrite_query(raw: Option<&str>, identity: Option<&ResolvedIdentity>) -> String {
    let mut pairs = stripped_pairs(raw);
    match identity {
        Some(identity) => {
            let id = identity.user_id.to_string();
            pairs.push((USER_ID.to_string(), id.clone()));
            pairs.push((USER_ROLE.to_string(), identity.role_id.to_string()));
            pairs.push((USER_ID_TO_GET.to_string(), id));
        }
        None => pairs.push((USER_ROLE.to_string(), Role::ANONYMOUS_ID.to_string())),
    }
    encode(&pairs)
}
