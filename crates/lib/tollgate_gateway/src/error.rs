//! Gateway error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no route for {0}")]
    NotFound(String),

    #[error("request body too large: {0}")]
    BodyTooLarge(String),

    #[error("request body unreadable: {0}")]
    BadBody(String),

    #[error("upstream unavailable: {0}")]
    Upstream(String),

    #[error("internal gateway error: {0}")]
    Internal(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            GatewayError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", "Not found"),
            GatewayError::BodyTooLarge(_) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                "Request body too large",
            ),
            GatewayError::BadBody(detail) => {
                warn!(detail = %detail, "request body read failed");
                (StatusCode::BAD_REQUEST, "bad_request", "Request body unreadable")
            }
            GatewayError::Upstream(detail) => {
                warn!(detail = %detail, "upstream call failed");
                (StatusCode::BAD_GATEWAY, "bad_gateway", "Upstream unavailable")
            }
            GatewayError::Internal(detail) => {
                error!(detail = %detail, "gateway failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        (status, Json(json!({ "error": error, "message": message }))).into_response()
    }
}
