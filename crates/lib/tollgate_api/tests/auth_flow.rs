//! Router-level tests: drive the auth API end to end against the in-memory store.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Duration;
use serde_json::{Value, json};
use tollgate_api::{AppState, config::ApiConfig};
use tollgate_core::auth::settings::AuthSettings;
use tollgate_core::email::{EmailError, EmailMessage, EmailSender};
use tower::ServiceExt;

#[derive(Default)]
struct Outbox(Mutex<Vec<EmailMessage>>);

impl Outbox {
    fn last_token(&self) -> String {
        let sent = self.0.lock().unwrap();
        let body = &sent.last().expect("no email sent").body;
        body.rsplit('/').next().unwrap().to_string()
    }

    fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

#[async_trait]
impl EmailSender for Outbox {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        self.0.lock().unwrap().push(message.clone());
        Ok(())
    }
}

fn app_with(settings: AuthSettings) -> (Router, Arc<Outbox>) {
    let outbox = Arc::new(Outbox::default());
    let state = AppState::in_memory(ApiConfig::new(settings), outbox.clone()).unwrap();
    (tollgate_api::router(state), outbox)
}

fn app() -> (Router, Arc<Outbox>) {
    app_with(AuthSettings::new("test-secret", "test-salt"))
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(json) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.expect("request");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Sign up and confirm `username`, then sign in and return the token body.
async fn registered(app: &Router, outbox: &Outbox, username: &str) -> Value {
    let (status, _) = call(
        app,
        "POST",
        "/api/v1/auth/sign-up",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "password1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        app,
        "POST",
        "/api/v1/auth/confirm",
        None,
        Some(json!({ "confirm_token": outbox.last_token() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, tokens) = call(
        app,
        "POST",
        "/api/v1/auth/sign-in",
        None,
        Some(json!({ "login": username, "password": "password1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    tokens
}

#[tokio::test]
async fn access_token_expires_and_refresh_replaces_it() {
    let (app, outbox) =
        app_with(AuthSettings::new("test-secret", "test-salt").with_access_ttl(Duration::seconds(1)));
    let tokens = registered(&app, &outbox, "ann_1").await;
    assert_eq!(tokens["expire_in"], 1);
    let access = tokens["access_token"].as_str().unwrap().to_string();
    let refresh = tokens["refresh_token"].as_str().unwrap().to_string();

    let (status, me) = call(&app, "GET", "/api/v1/auth/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "ann_1");

    tokio::time::sleep(StdDuration::from_millis(2100)).await;

    let (status, _) = call(&app, "GET", "/api/v1/auth/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, fresh) = call(
        &app,
        "POST",
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refresh_token": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let new_access = fresh["access_token"].as_str().unwrap();

    let (status, _) = call(&app, "GET", "/api/v1/auth/me", Some(new_access), None).await;
    assert_eq!(status, StatusCode::OK);

    // The consumed refresh token cannot be replayed.
    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refresh_token": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn verify_reports_id_and_role_id() {
    let (app, outbox) = app();
    let tokens = registered(&app, &outbox, "ann_1").await;
    let access = tokens["access_token"].as_str().unwrap();

    let (status, body) = call(&app, "GET", "/api/v1/auth/verify", Some(access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "id": 1, "role": 1 }));

    let (status, body) = call(&app, "GET", "/api/v1/auth/verify", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = call(&app, "GET", "/api/v1/auth/verify", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_sign_up_is_bad_request() {
    let (app, outbox) = app();
    registered(&app, &outbox, "ann_1").await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/auth/sign-up",
        None,
        Some(json!({
            "username": "ann_1",
            "email": "new@example.com",
            "password": "password1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn bad_sign_in_is_unauthorized() {
    let (app, outbox) = app();
    registered(&app, &outbox, "ann_1").await;

    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/auth/sign-in",
        None,
        Some(json!({ "login": "ann_1@example.com", "password": "password2" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reset_request_is_ok_for_unknown_email() {
    let (app, outbox) = app();
    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/auth/reset-password",
        None,
        Some(json!({ "email": "ghost@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(outbox.count(), 0);
}

#[tokio::test]
async fn reset_flow_over_http() {
    let (app, outbox) = app();
    registered(&app, &outbox, "ann_1").await;

    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/auth/reset-password",
        None,
        Some(json!({ "email": "ann_1@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = outbox.last_token();

    let confirm = json!({ "reset_token": token, "password": "password2" });
    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/auth/confirm-password",
        None,
        Some(confirm.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, "POST", "/api/v1/auth/confirm-password", None, Some(confirm)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/auth/sign-in",
        None,
        Some(json!({ "login": "ann_1", "password": "password2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn sign_out_revokes_refresh_token() {
    let (app, outbox) = app();
    let tokens = registered(&app, &outbox, "ann_1").await;
    let refresh = tokens["refresh_token"].clone();

    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/auth/sign-out",
        None,
        Some(json!({ "refresh_token": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refresh_token": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_read_is_public_and_write_is_owner_only() {
    let (app, outbox) = app();
    let ann = registered(&app, &outbox, "ann_1").await;
    let bob = registered(&app, &outbox, "bob_1").await;
    let ann_access = ann["access_token"].as_str().unwrap();
    let bob_access = bob["access_token"].as_str().unwrap();

    let update = json!({ "first_name": "Ann", "phone": "+1-555-0100" });
    let (status, _) = call(
        &app,
        "PUT",
        "/api/v1/users/ann_1/profile",
        Some(ann_access),
        Some(update.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &app,
        "PUT",
        "/api/v1/users/ann_1/profile",
        Some(bob_access),
        Some(update.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&app, "PUT", "/api/v1/users/ann_1/profile", None, Some(update)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, profile) = call(&app, "GET", "/api/v1/users/ann_1/profile", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "ann_1");
    assert_eq!(profile["first_name"], "Ann");
    assert_eq!(profile["role"], "user");
    assert!(profile.get("phone").is_none(), "{profile}");

    let (status, _) = call(&app, "GET", "/api/v1/users/ghost/profile", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn change_password_over_http() {
    let (app, outbox) = app();
    let ann = registered(&app, &outbox, "ann_1").await;
    let access = ann["access_token"].as_str().unwrap();

    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/users/ann_1/password",
        Some(access),
        Some(json!({ "old_password": "password1", "new_password": "password2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refresh_token": ann["refresh_token"] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
