//! Request forwarding.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::header::{HeaderMap, HeaderName, HeaderValue};
use axum::http::{Method, StatusCode, Uri};
use axum::response::Response;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::GatewayState;
use crate::error::GatewayError;
use crate::identity::{rewrite_query, strip_identity};
use crate::routing::{RouteClass, classify};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Connection-scoped headers and `host` stay with the hop they arrived on.
fn forwardable(name: &HeaderName) -> bool {
    !matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
            | "host"
    )
}

fn copy_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from {
        if forwardable(name) {
            to.append(name.clone(), value.clone());
        }
    }
}

/// Only a length-limit rejection means the body was too large. Anything else
/// is a broken or aborted upload.
fn body_error(rejection: BytesRejection) -> GatewayError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GatewayError::BodyTooLarge(rejection.body_text())
    } else {
        GatewayError::BadBody(rejection.body_text())
    }
}

/// Fallback handler: classify, rewrite identity, forward.
///
/// The body limit comes from the `DefaultBodyLimit` layer installed by
/// [`crate::router`].
pub async fn gateway_handler(
    State(state): State<GatewayState>,
    method: Method,
    uri: Uri,
    mut headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, GatewayError> {
    let path = uri.path().to_string();
    let class = classify(&path).ok_or_else(|| GatewayError::NotFound(path.clone()))?;

    let query = match class {
        RouteClass::PublicAuth => strip_identity(uri.query()),
        RouteClass::Protected => {
            let identity = match state.resolver.resolve(&headers).await {
                Ok(identity) => Some(identity),
                Err(e) => {
                    debug!(path = %path, reason = %e, "forwarding as anonymous");
                    None
                }
            };
            rewrite_query(uri.query(), identity.as_ref())
        }
    };

    let upstream = match class {
        RouteClass::PublicAuth => &state.config.auth_service_url,
        RouteClass::Protected => &state.config.data_service_url,
    };

    let body = body.map_err(body_error)?;

    let request_id = ensure_request_id(&mut headers)?;
    info!(
        method = %method,
        path = %path,
        request_id = %request_id,
        upstream = %upstream,
        "forwarding"
    );

    let outbound = Outbound {
        method,
        headers: &headers,
        path: &path,
        query: &query,
        body,
    };
    forward(&state.client, upstream, outbound, &request_id).await
}

/// Read the caller's `x-request-id`, or generate a UUIDv7 one and attach it.
fn ensure_request_id(headers: &mut HeaderMap) -> Result<String, GatewayError> {
    if let Some(existing) = headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok()) {
        return Ok(existing.to_string());
    }
    let id = Uuid::now_v7().to_string();
    let value = HeaderValue::from_str(&id).map_err(|e| GatewayError::Internal(e.to_string()))?;
    headers.insert(X_REQUEST_ID, value);
    Ok(id)
}

/// Rewritten request on its way upstream.
struct Outbound<'a> {
    method: Method,
    headers: &'a HeaderMap,
    path: &'a str,
    query: &'a str,
    body: Bytes,
}

/// Send the request to `upstream` and relay the response.
async fn forward(
    client: &reqwest::Client,
    upstream: &Url,
    outbound: Outbound<'_>,
    request_id: &str,
) -> Result<Response, GatewayError> {
    let mut url = upstream.clone();
    url.set_path(outbound.path);
    url.set_query((!outbound.query.is_empty()).then_some(outbound.query));

    let mut headers = HeaderMap::new();
    copy_headers(outbound.headers, &mut headers);

    let upstream_response = client
        .request(outbound.method, url)
        .headers(headers)
        .body(outbound.body)
        .send()
        .await
        .map_err(|e| GatewayError::Upstream(e.to_string()))?;

    let status = upstream_response.status();
    let mut response_headers = HeaderMap::new();
    copy_headers(upstream_response.headers(), &mut response_headers);
    if !response_headers.contains_key(X_REQUEST_ID) {
        let value = HeaderValue::from_str(request_id)
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        response_headers.insert(X_REQUEST_ID, value);
    }
    debug!(status = status.as_u16(), request_id, "upstream responded");

    let mut response = Response::new(Body::from_stream(upstream_response.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}
