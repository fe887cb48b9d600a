use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::http::AppState;

/// Accepts `/internal/*` requests only from a loopback peer with no
/// forwarding header present (a reverse proxy setting one would indicate
/// the request didn't actually originate on localhost), and carrying the
/// shared secret the terminal proxy was configured with. Rejections are
/// 404, not 403 — route existence is not disclosed to non-local callers.
pub async fn require_loopback(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let has_forwarding_header = request.headers().keys().any(|name| {
        let lower = name.as_str().to_ascii_lowercase();
        lower == "x-forwarded-for" || lower == "forwarded" || lower == "x-real-ip"
    });

    let has_valid_secret = request
        .headers()
        .get("x-internal-secret")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == state.config.api.internal_shared_secret)
        .unwrap_or(false);

    let is_loopback = peer.map(|ip| ip.is_loopback()).unwrap_or(false);

    if is_loopback && !has_forwarding_header && has_valid_secret {
        Ok(next.run(request).await)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}
