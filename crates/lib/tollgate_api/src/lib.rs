//! # tollgate_api
//!
//! HTTP API library for the Tollgate auth service.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use sqlx::PgPool;
use tollgate_core::auth::AuthError;
use tollgate_core::auth::service::CredentialService;
use tollgate_core::auth::users::UserService;
use tollgate_core::email::EmailSender;
use tollgate_core::store::{CredentialStore, MemoryCredentialStore, PgCredentialStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, users};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Credential lifecycle operations.
    pub auth: CredentialService,
    /// Profile operations.
    pub users: UserService,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// Wire services over `store` with the default hasher and codec.
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn CredentialStore>,
        mailer: Arc<dyn EmailSender>,
    ) -> Result<Self, AuthError> {
        let auth = CredentialService::from_settings(config.auth.clone(), store, mailer)?;
        let users = UserService::new(auth.store(), auth.hasher());
        Ok(Self {
            auth,
            users,
            config,
        })
    }

    /// State backed by PostgreSQL.
    pub fn with_pool(
        config: ApiConfig,
        pool: PgPool,
        mailer: Arc<dyn EmailSender>,
    ) -> Result<Self, AuthError> {
        Self::new(config, Arc::new(PgCredentialStore::new(pool)), mailer)
    }

    /// State backed by the in-memory store.
    pub fn in_memory(config: ApiConfig, mailer: Arc<dyn EmailSender>) -> Result<Self, AuthError> {
        Self::new(config, Arc::new(MemoryCredentialStore::new()), mailer)
    }
}

/// Run embedded database migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    tollgate_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::POST_AUTH_SIGN_UP, post(auth::sign_up_handler))
        .route(routes::POST_AUTH_SIGN_IN, post(auth::sign_in_handler))
        .route(routes::POST_AUTH_SIGN_OUT, post(auth::sign_out_handler))
        .route(routes::POST_AUTH_CONFIRM, post(auth::confirm_handler))
        .route(
            routes::POST_AUTH_RESEND_CONFIRMATION,
            post(auth::resend_confirmation_handler),
        )
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler))
        .route(
            routes::POST_AUTH_RESET_PASSWORD,
            post(auth::reset_password_handler),
        )
        .route(
            routes::POST_AUTH_CONFIRM_PASSWORD,
            post(auth::confirm_password_handler),
        )
        .route(routes::GET_USER_PROFILE, get(users::get_profile_handler));

    // Protected routes (require a valid bearer token)
    let protected = Router::new()
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .route(routes::GET_AUTH_VERIFY, get(auth::verify_handler))
        .route(routes::PUT_USER_PROFILE, put(users::update_profile_handler))
        .route(
            routes::POST_USER_PASSWORD,
            post(users::change_password_handler),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
