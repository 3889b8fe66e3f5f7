//! User profile handlers.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use tollgate_core::models::auth::{ProfileUpdate, UserProfile};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{ChangePasswordRequest, StatusResponse};

/// `GET /users/{username}/profile`
pub async fn get_profile_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<UserProfile>> {
    let profile = state.users.get_profile(&username).await?;
    Ok(Json(profile))
}

/// `PUT /users/{username}/profile`: owner or admin only.
pub async fn update_profile_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(username): Path<String>,
    Json(body): Json<ProfileUpdate>,
) -> AppResult<Json<StatusResponse>> {
    state.users.update_profile(&user.0, &username, &body).await?;
    Ok(Json(StatusResponse::ok()))
}

/// `POST /users/{username}/password`
pub async fn change_password_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(username): Path<String>,
    Json(body): Json<ChangePasswordRequest>,
) -> AppResult<Json<StatusResponse>> {
    state
        .users
        .change_password(&user.0, &username, &body.old_password, &body.new_password)
        .await?;
    Ok(Json(StatusResponse::ok()))
}
