//! Terminal proxy configuration. Loaded the same way as the project
//! service's: a TOML file, per-field defaults, paths resolved relative
//! to the config file's own directory.

use std::path::{Path, PathBuf};

use pomodex_core::config::DockerConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8081
}

/// Where and how to reach the project service's internal validation
/// endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlPlaneConfig {
    #[serde(default = "default_validate_url")]
    pub validate_url: String,
    pub internal_shared_secret: String,
    #[serde(default = "default_validate_timeout_secs")]
    pub validate_timeout_secs: u64,
}

fn default_validate_url() -> String {
    "http://127.0.0.1:8080/internal/validate".into()
}
fn default_validate_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_audit_dir")]
    pub directory: PathBuf,
}

fn default_audit_dir() -> PathBuf {
    PathBuf::from(".pomodex/audit")
}

#[derive(Debug, Clone, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub listen: ListenConfig,
    pub control_plane: ControlPlaneConfig,
    pub docker: DockerConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { directory: default_audit_dir() }
    }
}

impl Configuration {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config file {}: {e}", path.display()))?;
        let mut config: Configuration = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing config file {}: {e}", path.display()))?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        config.audit.directory = pomodex_core::config::resolve_path(&config.audit.directory, base_dir);

        Ok(config)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("terminal-proxy.toml")
}
