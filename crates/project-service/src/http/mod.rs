pub mod error_response;
pub mod handlers;
pub mod middleware;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::routing::{get, post};
use axum::Router;
use pomodex_core::db::Database;
use pomodex_core::docker::DockerManager;
use tower_http::trace::TraceLayer;

use crate::config::Configuration;
use crate::orchestrator::Orchestrator;

pub struct AppState {
    pub db: Arc<Database>,
    pub docker: Arc<DockerManager>,
    pub orchestrator: Arc<Orchestrator>,
    pub config: Configuration,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/healthz", get(handlers::health::healthz));

    let authenticated = Router::new()
        .route("/projects", get(handlers::projects::list).post(handlers::projects::create))
        .route("/projects/:id", get(handlers::projects::get_one).delete(handlers::projects::delete))
        .route("/projects/:id/stop", post(handlers::projects::stop))
        .route("/projects/:id/start", post(handlers::projects::start))
        .route("/projects/:id/snapshot", post(handlers::projects::stop))
        .route("/projects/:id/restore", post(handlers::projects::start))
        .route("/projects/:id/backup-status", get(handlers::projects::backup_status))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), middleware::auth::require_auth));

    let internal = Router::new()
        .route("/internal/validate", post(handlers::internal::validate))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), middleware::internal::require_loopback));

    Router::new()
        .merge(public)
        .merge(authenticated)
        .merge(internal)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Extracts the caller's socket address for the internal-only middleware.
/// Exposed so `main.rs` can require `ConnectInfo` on the listener.
pub type PeerAddr = ConnectInfo<SocketAddr>;
