use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::clicks::ClickRequest;
use crate::service::{LinkService, ServiceError};

pub struct RedirectState {
    pub service: Arc<LinkService>,
}

/// Build the click metadata from request headers. The socket address is the
/// fallback when no proxy forwarded the client IP.
pub fn click_request_from(headers: &HeaderMap, addr: SocketAddr) -> ClickRequest {
    let source_ip = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .unwrap_or_else(|| addr.ip().to_string());

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(String::from);

    let referrer = headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .map(String::from);

    ClickRequest {
        source_ip: Some(source_ip),
        user_agent,
        referrer,
    }
}

/// Resolve an identifier and redirect to the destination. The click is
/// dispatched fire-and-forget; the 307 goes out without waiting on any
/// analytics write, and a recording failure can never turn into a redirect
/// failure.
pub async fn redirect_identifier(
    State(state): State<Arc<RedirectState>>,
    Path(identifier): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let click = click_request_from(&headers, addr);

    match state.service.resolve_for_redirect(&identifier, click).await {
        Ok(link) => Redirect::temporary(&link.long_url).into_response(),
        // The common case for mistyped paths; not a system error.
        Err(ServiceError::NotFound) => (StatusCode::NOT_FOUND, "Link not found").into_response(),
        Err(err) => {
            tracing::error!(identifier = %identifier, error = %err, "redirect lookup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

/// Health check for the redirect listener.
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}
