use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;

use crate::http::AppState;

/// Checks DB connectivity and Docker socket reachability, mirroring the
/// checks the teacher runs as a CLI diagnostics command, exposed here as
/// a route since an unattended control plane needs an external health
/// signal rather than an operator running a command by hand.
pub async fn healthz(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.db.users().find_by_id("healthcheck").await.is_err() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    if state.docker.docker().ping().await.is_err() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    StatusCode::OK
}
