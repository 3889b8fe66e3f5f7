//! API server configuration.

use tollgate_core::auth::settings::AuthSettings;

/// Configuration for the auth API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8000").
    pub bind_addr: String,
    /// PostgreSQL connection URL. `None` runs against the in-memory store.
    pub database_url: Option<String>,
    /// Signing secret, salt, lifetimes, and email link bases.
    pub auth: AuthSettings,
}

impl ApiConfig {
    pub const DEFAULT_BIND_ADDR: &'static str = "127.0.0.1:8000";

    pub fn new(auth: AuthSettings) -> Self {
        Self {
            bind_addr: Self::DEFAULT_BIND_ADDR.to_string(),
            database_url: None,
            auth,
        }
    }
}
