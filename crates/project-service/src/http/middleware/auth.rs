use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use pomodex_core::auth::decode_access_token;

use crate::http::AppState;

/// The authenticated user id, inserted as a request extension for
/// handlers to pick up. Decode failure never discloses which check
/// failed — every rejection is a bare 401.
#[derive(Clone)]
pub struct AuthenticatedUser(pub String);

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = decode_access_token(token, &state.config.auth.token_signing_key)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(AuthenticatedUser(claims.sub));
    Ok(next.run(request).await)
}
