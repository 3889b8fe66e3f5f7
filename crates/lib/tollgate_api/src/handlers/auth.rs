//! Authentication request handlers.

use axum::extract::State;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    ConfirmRequest, ConfirmResetRequest, EmailRequest, MeResponse, RefreshRequest, SignInRequest,
    SignUpRequest, StatusResponse, TokenResponse, VerifyResponse,
};

/// `POST /auth/sign-up`: register an unconfirmed account.
pub async fn sign_up_handler(
    State(state): State<AppState>,
    Json(body): Json<SignUpRequest>,
) -> AppResult<Json<StatusResponse>> {
    state
        .auth
        .sign_up(&body.username, &body.email, &body.password)
        .await?;
    Ok(Json(StatusResponse::ok()))
}

/// `POST /auth/sign-in`: authenticate with email or username + password.
pub async fn sign_in_handler(
    State(state): State<AppState>,
    Json(body): Json<SignInRequest>,
) -> AppResult<Json<TokenResponse>> {
    let pair = state.auth.sign_in(&body.login, &body.password).await?;
    Ok(Json(pair.into()))
}

/// `POST /auth/confirm`
pub async fn confirm_handler(
    State(state): State<AppState>,
    Json(body): Json<ConfirmRequest>,
) -> AppResult<Json<StatusResponse>> {
    state.auth.confirm_user(&body.confirm_token).await?;
    Ok(Json(StatusResponse::ok()))
}

/// `POST /auth/resend-confirmation`: always `ok` unless delivery fails.
pub async fn resend_confirmation_handler(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> AppResult<Json<StatusResponse>> {
    state.auth.resend_confirmation(&body.email).await?;
    Ok(Json(StatusResponse::ok()))
}

/// `POST /auth/refresh`: exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let pair = state.auth.refresh_token(&body.refresh_token).await?;
    Ok(Json(pair.into()))
}

/// `POST /auth/sign-out`: revoke a refresh token.
pub async fn sign_out_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<StatusResponse>> {
    state.auth.sign_out(&body.refresh_token).await?;
    Ok(Json(StatusResponse::ok()))
}

/// `POST /auth/reset-password`: always `ok` unless delivery fails.
pub async fn reset_password_handler(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> AppResult<Json<StatusResponse>> {
    state.auth.reset_password(&body.email).await?;
    Ok(Json(StatusResponse::ok()))
}

/// `POST /auth/confirm-password`
pub async fn confirm_password_handler(
    State(state): State<AppState>,
    Json(body): Json<ConfirmResetRequest>,
) -> AppResult<Json<StatusResponse>> {
    state
        .auth
        .confirm_reset_password(&body.reset_token, &body.password)
        .await?;
    Ok(Json(StatusResponse::ok()))
}

/// `GET /auth/me`
pub async fn me_handler(Extension(user): Extension<AuthenticatedUser>) -> Json<MeResponse> {
    Json(MeResponse {
        status: "ok".to_string(),
        username: user.0.user_name,
    })
}

/// `GET /auth/verify`: identity lookup for the gateway.
pub async fn verify_handler(Extension(user): Extension<AuthenticatedUser>) -> Json<VerifyResponse> {
    Json(VerifyResponse::from(&user.0))
}
