//! # tollgate_gateway
//!
//! Edge gateway that converts bearer tokens into trusted identity query
//! fields and forwards requests to the auth and data services.

pub mod config;
pub mod error;
pub mod identity;
pub mod proxy;
pub mod routing;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower_http::trace::TraceLayer;

use crate::config::{GatewayConfig, VerifierMode};
use crate::error::GatewayError;
use crate::identity::{IdentityResolver, LocalResolver, RemoteResolver};

/// Shared gateway state. Holds no per-request data.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<GatewayConfig>,
    pub client: reqwest::Client,
    pub resolver: Arc<dyn IdentityResolver>,
}

impl GatewayState {
    /// Build the HTTP client and the resolver selected by `config.verifier`.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("http client: {e}")))?;

        let resolver: Arc<dyn IdentityResolver> = match &config.verifier {
            VerifierMode::Local { jwt_secret } => Arc::new(LocalResolver::from_secret(jwt_secret)),
            VerifierMode::Remote => {
                Arc::new(RemoteResolver::new(client.clone(), &config.auth_service_url))
            }
        };

        Ok(Self::with_resolver(config, client, resolver))
    }

    pub fn with_resolver(
        config: GatewayConfig,
        client: reqwest::Client,
        resolver: Arc<dyn IdentityResolver>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            client,
            resolver,
        }
    }
}

/// Every path goes through the fallback; classification happens there.
pub fn router(state: GatewayState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.max_body_bytes);
    Router::new()
        .fallback(proxy::gateway_handler)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
