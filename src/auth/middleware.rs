//! Authorization gate and client-IP middleware.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use super::{AUTH_USER_KEY, LOGIN_PATH};
use crate::error::AppError;
use crate::session::Session;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Client address recorded by `add_client_ip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }
}

/// Resolve the client IP: first `X-Forwarded-For` entry, then the peer
/// address, then "unknown".
fn client_ip(parts: &Parts) -> ClientIp {
    let forwarded = parts
        .headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(ip) = forwarded {
        return ClientIp(ip.to_string());
    }

    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| ClientIp(addr.ip().to_string()))
        .unwrap_or_else(ClientIp::unknown)
}

/// Middleware: record the client IP in request extensions.
pub async fn add_client_ip(request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let ip = client_ip(&parts);
    parts.extensions.insert(ip);
    next.run(Request::from_parts(parts, body)).await
}

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<ClientIp>()
            .cloned()
            .unwrap_or_else(ClientIp::unknown))
    }
}

/// Route gate: pass through when the session holds an authenticated user,
/// otherwise redirect (307) to the login page. Never writes to the session.
pub async fn require_auth(session: Session, request: Request, next: Next) -> Response {
    match session.exists(AUTH_USER_KEY) {
        Ok(true) => next.run(request).await,
        Ok(false) => {
            tracing::debug!("Unauthenticated request to {}", request.uri().path());
            Redirect::temporary(LOGIN_PATH).into_response()
        }
        Err(e) => AppError::from(e).into_response(),
    }
}
