//! Gateway configuration.

use std::fmt;
use std::time::Duration;

use url::Url;

/// How the gateway turns a bearer token into an identity.
#[derive(Clone)]
pub enum VerifierMode {
    /// Verify access tokens in-process with the shared signing key.
    Local { jwt_secret: String },
    /// Ask the auth service's `/api/v1/auth/verify` endpoint.
    Remote,
}

impl fmt::Debug for VerifierMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifierMode::Local { .. } => f.write_str("Local"),
            VerifierMode::Remote => f.write_str("Remote"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8888").
    pub bind_addr: String,
    /// Base URL of the auth service (public-auth routes, remote verification).
    pub auth_service_url: Url,
    /// Base URL of the data service (protected routes).
    pub data_service_url: Url,
    pub verifier: VerifierMode,
    /// Deadline for each upstream call.
    pub upstream_timeout: Duration,
    /// Largest request body the gateway buffers before forwarding.
    pub max_body_bytes: usize,
}

impl GatewayConfig {
    pub const DEFAULT_BIND_ADDR: &'static str = "127.0.0.1:8888";
    pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

    pub fn new(auth_service_url: Url, data_service_url: Url, verifier: VerifierMode) -> Self {
        Self {
            bind_addr: Self::DEFAULT_BIND_ADDR.to_string(),
            auth_service_url,
            data_service_url,
            verifier,
            upstream_timeout: Self::DEFAULT_UPSTREAM_TIMEOUT,
            max_body_bytes: Self::DEFAULT_MAX_BODY_BYTES,
        }
    }
}
