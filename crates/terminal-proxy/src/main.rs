//! Pomodex terminal proxy - relays terminal WebSocket frames between
//! clients and the in-sandbox ttyd server, with input audit logging.

mod audit;
mod config;
mod upstream;
mod validate;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::get;
use axum::Router;
use clap::{Parser, Subcommand};
use pomodex_core::docker::DockerManager;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use audit::AuditLog;
use config::Configuration;

pub struct AppState {
    pub docker: DockerManager,
    pub http_client: reqwest::Client,
    pub config: Configuration,
    pub audit: AuditLog,
}

#[derive(Parser)]
#[command(name = "pomodex-terminal-proxy")]
#[command(about = "Pomodex terminal WebSocket proxy")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(short, long, default_value_os_t = config::default_config_path())]
    config: std::path::PathBuf,

    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print resolved configuration and check Docker connectivity.
    Diagnostics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("pomodex_terminal_proxy={log_level}").into()),
        )
        .init();

    info!("starting pomodex-terminal-proxy v{}", env!("CARGO_PKG_VERSION"));

    let config = Configuration::load(&cli.config)?;

    if let Some(Commands::Diagnostics) = cli.command {
        return run_diagnostics(&config).await;
    }

    let docker = DockerManager::connect(config.docker.clone())?;
    let audit = AuditLog::open(&config.audit.directory)?;
    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.control_plane.validate_timeout_secs + 1))
        .build()
        .map_err(|e| anyhow::anyhow!("building http client: {e}"))?;

    let listen = config.listen.clone();
    let state = Arc::new(AppState { docker, http_client, config, audit });

    let app = Router::new()
        .route("/terminal/:project_id", get(ws::terminal_handler))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let bind_addr: SocketAddr = format!("{}:{}", listen.host, listen.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address: {e}"))?;

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("pomodex-terminal-proxy stopped");
    Ok(())
}

async fn run_diagnostics(config: &Configuration) -> Result<()> {
    println!("listen: {}:{}", config.listen.host, config.listen.port);
    println!("control plane validate url: {}", config.control_plane.validate_url);
    println!("docker socket: {}", config.docker.socket);
    println!("audit directory: {}", config.audit.directory.display());

    match DockerManager::connect(config.docker.clone()) {
        Ok(docker) => match docker.docker().ping().await {
            Ok(_) => println!("docker: reachable"),
            Err(e) => println!("docker: unreachable ({e})"),
        },
        Err(e) => println!("docker: connection failed ({e})"),
    }

    Ok(())
}

/// Checks Docker socket reachability, matching the project service's
/// health check; the proxy has no database of its own.
async fn healthz(axum::extract::State(state): axum::extract::State<Arc<AppState>>) -> axum::http::StatusCode {
    if state.docker.docker().ping().await.is_err() {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    } else {
        axum::http::StatusCode::OK
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install ctrl-c handler");
        return;
    }
    warn!("received shutdown signal");
}
