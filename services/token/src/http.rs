//! HTTP routes over the token lifecycle manager.
//!
//! `InvalidCredential` maps to 401; every other failure maps to a generic
//! 500 so store and signature details never reach the client.

use crate::metrics;
use crate::refresh::{TokenLifecycleManager, TokenPair};
use axum::extract::{ConnectInfo, FromRequestParts, Query, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};
use uuid::Uuid;

/// Token pair response body.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokensResponse {
    /// Signed access token
    pub access_token: String,
    /// Signed refresh token
    pub refresh_token: String,
}

impl From<TokenPair> for TokensResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Human-readable message without internal detail
    pub error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Build the service router.
pub fn router(manager: Arc<TokenLifecycleManager>) -> Router {
    Router::new()
        .route("/api/v1/healthz", get(healthz))
        .route("/api/v1/auth/tokens", post(issue_tokens))
        .route("/api/v1/auth/tokens/refresh", post(refresh_tokens))
        .route("/metrics", get(render_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(manager)
}

/// Client address: `X-Real-IP`, then the first `X-Forwarded-For` hop, then
/// the peer socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ip) = client_ip_from_headers(&parts.headers) {
            return Ok(ClientIp(ip));
        }
        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| ClientIp(addr.ip()))
            .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "unable to determine client address"))
    }
}

fn client_ip_from_headers(headers: &HeaderMap) -> Option<IpAddr> {
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok());
    if real_ip.is_some() {
        return real_ip;
    }

    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    (scheme == "Bearer" && !token.is_empty()).then_some(token)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn render_metrics() -> String {
    metrics::render()
}

#[derive(Debug, Deserialize)]
struct IssueParams {
    user_id: Option<String>,
}

async fn issue_tokens(
    State(manager): State<Arc<TokenLifecycleManager>>,
    ClientIp(client_ip): ClientIp,
    Query(params): Query<IssueParams>,
) -> Response {
    let Some(raw) = params.user_id.filter(|s| !s.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "missing user_id query param");
    };
    let Ok(user_id) = Uuid::parse_str(&raw) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid user_id query param");
    };

    match manager.issue(user_id, client_ip).await {
        Ok(pair) => (StatusCode::OK, Json(TokensResponse::from(pair))).into_response(),
        Err(e) => {
            error!(error = %e, user_id = %user_id, "failed to issue tokens");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to issue tokens")
        }
    }
}

async fn refresh_tokens(
    State(manager): State<Arc<TokenLifecycleManager>>,
    ClientIp(client_ip): ClientIp,
    headers: HeaderMap,
) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "missing or invalid authorization header",
        );
    };

    match manager.rotate(token, client_ip).await {
        Ok(pair) => (StatusCode::OK, Json(TokensResponse::from(pair))).into_response(),
        Err(e) if e.is_unauthorized() => {
            warn!(error = %e, "refresh rejected");
            error_response(StatusCode::UNAUTHORIZED, "invalid refresh token")
        }
        Err(e) => {
            error!(error = %e, "failed to refresh tokens");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to refresh tokens")
        }
    }
}
