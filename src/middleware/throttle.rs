//! Request budget for the REST API.
//!
//! Authenticated callers are keyed by user id; anonymous callers by the first
//! `X-Forwarded-For` entry or the peer address.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::state::AppState;

/// Best-effort client identifier for anonymous callers
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

/// Peer address when the server was started with connect info
pub fn peer_addr(req: &Request) -> Option<SocketAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Client identifier as an extractor, for per-client budgets inside handlers
#[derive(Debug, Clone)]
pub struct ClientKey(pub String);

impl<S> FromRequestParts<S> for ClientKey
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientKey(client_key(&parts.headers, peer)))
    }
}

/// Must run after `optional_auth` so the user is already attached
pub async fn api_throttle(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let allowed = match req.extensions().get::<AuthenticatedUser>() {
        Some(user) => state
            .api_user_limiter
            .try_acquire(&format!("user:{}", user.id())),
        None => {
            let key = client_key(req.headers(), peer_addr(&req));
            state.api_anon_limiter.try_acquire(&format!("anon:{}", key))
        }
    };

    if !allowed {
        tracing::warn!(path = %req.uri().path(), "API request throttled");
        return AppError::TooManyRequests("Request was throttled.".to_string()).into_response();
    }

    next.run(req).await
}
