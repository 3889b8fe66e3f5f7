//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tollgate_core::auth::AuthError;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Expired: {0}")]
    Expired(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::Conflict(m) => (StatusCode::BAD_REQUEST, "conflict", m.as_str()),
            AppError::NotFound(m) => (StatusCode::BAD_REQUEST, "not_found", m.as_str()),
            AppError::Expired(m) => (StatusCode::BAD_REQUEST, "expired", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::Internal(detail) => {
                error!(detail = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::ValidationError(msg) => AppError::Validation(msg),
            AuthError::Conflict(msg) => AppError::Conflict(msg),
            AuthError::NotFound(msg) => AppError::NotFound(msg),
            AuthError::Expired(msg) => AppError::Expired(msg),
            AuthError::Unauthorized(msg) => AppError::Unauthorized(msg),
            AuthError::Forbidden(msg) => AppError::Forbidden(msg),
            AuthError::Delivery(msg) => AppError::Internal(format!("email delivery: {msg}")),
            AuthError::DbError(e) => AppError::Internal(e.to_string()),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn taxonomy_maps_to_status() {
        let cases = [
            (AuthError::Conflict("dup".into()), StatusCode::BAD_REQUEST),
            (AuthError::NotFound("x".into()), StatusCode::BAD_REQUEST),
            (AuthError::Expired("x".into()), StatusCode::BAD_REQUEST),
            (AuthError::ValidationError("x".into()), StatusCode::BAD_REQUEST),
            (AuthError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AuthError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (AuthError::Delivery("smtp".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AuthError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn internal_detail_is_not_leaked() {
        let resp = AppError::from(AuthError::DbError(sqlx::Error::PoolTimedOut)).into_response();
        let json = body_json(resp).await;
        assert_eq!(json["error"], "internal_error");
        assert_eq!(json["message"], "Internal server error");
    }
}
