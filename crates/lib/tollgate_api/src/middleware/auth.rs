//! Authentication middleware: bearer token extraction and verification.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tollgate_core::auth::parse_bearer;
use tollgate_core::models::auth::Identity;
use tracing::debug;

use crate::AppState;
use crate::error::AppError;

/// Verified caller identity, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies the
/// access token, and injects `AuthenticatedUser` into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("auth header is empty".into()))?;

    let token = parse_bearer(header)
        .ok_or_else(|| AppError::Unauthorized("auth header is invalid".into()))?;

    let identity = state.auth.verify(token).map_err(|e| {
        debug!(error = %e, "access token rejected");
        AppError::from(e)
    })?;

    request.extensions_mut().insert(AuthenticatedUser(identity));
    Ok(next.run(request).await)
}
