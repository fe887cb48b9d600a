//! Top-level configuration for the project-service binary.
//!
//! Loaded the way the teacher's `Configuration::load` does: read a TOML
//! file, deserialize with per-field defaults, resolve relative paths
//! against the config file's own directory.

use std::path::{Path, PathBuf};

use pomodex_core::config::{AuthConfig, CloudConfig, DatabaseConfig, DockerConfig, SweeperConfig};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared secret used to authorize the terminal proxy's calls to
    /// `/internal/validate`. Never exposed on the public listener.
    pub internal_shared_secret: String,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}

/// Settings used to synthesize a project's `terminal_url` (spec.md §6:
/// "host IP for external SSH, terminal proxy external port → terminal URL
/// synthesis").
#[derive(Debug, Clone, Deserialize)]
pub struct TerminalConfig {
    /// Public host/IP clients reach both SSH and the terminal proxy on.
    pub host_ip: String,
    /// Terminal proxy's externally reachable port.
    pub public_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Configuration {
    pub api: ApiConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub docker: DockerConfig,
    pub cloud: CloudConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
    pub terminal: TerminalConfig,
}

impl Configuration {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config file {}: {e}", path.display()))?;
        let mut config: Configuration = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing config file {}: {e}", path.display()))?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        config.database.path = pomodex_core::config::resolve_path(&config.database.path, base_dir);
        config.cloud.control_plane_sa_key_path =
            pomodex_core::config::resolve_path(&config.cloud.control_plane_sa_key_path, base_dir);

        Ok(config)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("pomodex.toml")
}
