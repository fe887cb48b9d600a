//! Pomodex project service - control plane for per-user sandbox containers.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pomodex_core::cloud::{FileTokenSource, GcpIamManager};
use pomodex_core::db::Database;
use pomodex_core::docker::DockerManager;
use pomodex_core::scheduler::Scheduler;
use tracing::{info, warn};

use pomodex_project_service::config::{default_config_path, Configuration};
use pomodex_project_service::http::{self, AppState};
use pomodex_project_service::orchestrator::Orchestrator;
use pomodex_project_service::sweeper;

#[derive(Parser)]
#[command(name = "pomodex-project-service")]
#[command(about = "Pomodex control plane: HTTP API, orchestrator, inactivity sweeper")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the TOML configuration file.
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: std::path::PathBuf,

    /// Enable debug logging.
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run schema setup against the configured database and exit.
    Migrate,
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
                .unwrap_or_else(|_| format!("pomodex_project_service={log_level},pomodex_core={log_level}").into()),
        )
        .init();

    info!("starting pomodex-project-service v{}", env!("CARGO_PKG_VERSION"));

    let config = Configuration::load(&cli.config)?;

    match cli.command {
        Some(Commands::Migrate) => return run_migrate(&config),
        Some(Commands::Diagnostics) => return run_diagnostics(&config).await,
        None => {}
    }

    let db = Arc::new(Database::open(&config.database.path)?);
    let docker = Arc::new(DockerManager::connect(config.docker.clone())?);

    let scope = "https://www.googleapis.com/auth/cloud-platform";
    let token_source = Arc::new(FileTokenSource::load(&config.cloud.control_plane_sa_key_path, scope)?);
    let reqwest_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .build()
        .map_err(|e| anyhow::anyhow!("building cloud api client: {e}"))?;
    let iam = GcpIamManager::new(reqwest_client, token_source, config.cloud.clone());

    let orchestrator = Arc::new(Orchestrator::new(db.clone(), docker.clone(), iam, config.clone()));

    let scheduler = Scheduler::new();
    let _sweeper_handle = sweeper::spawn(&scheduler, orchestrator.clone()).await;

    let state = Arc::new(AppState { db, docker, orchestrator, config: config.clone() });
    let app = http::build_router(state);

    let bind_addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address: {e}"))?;

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("pomodex-project-service stopped");
    Ok(())
}

/// `Database::open` already runs `init_tables` on first connect, so
/// migration is just that side effect triggered standalone, for operators
/// who want schema setup as an explicit first-deploy step.
fn run_migrate(config: &Configuration) -> Result<()> {
    Database::open(&config.database.path)?;
    info!(path = %config.database.path.display(), "database schema is up to date");
    Ok(())
}

async fn run_diagnostics(config: &Configuration) -> Result<()> {
    println!("api: {}:{}", config.api.host, config.api.port);
    println!("database: {}", config.database.path.display());
    println!("docker socket: {}", config.docker.socket);
    println!("cloud project: {}", config.cloud.project_id);
    println!("cloud bucket: {}", config.cloud.bucket);

    match DockerManager::connect(config.docker.clone()) {
        Ok(docker) => match docker.docker().ping().await {
            Ok(_) => println!("docker: reachable"),
            Err(e) => println!("docker: unreachable ({e})"),
        },
        Err(e) => println!("docker: connection failed ({e})"),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install ctrl-c handler");
        return;
    }
    warn!("received shutdown signal");
}
