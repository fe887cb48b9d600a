//! Shared configuration building blocks.
//!
//! Both binaries embed these structs in their own top-level `Configuration`
//! and load it the way the teacher's `Configuration::load` does: read a TOML
//! file, deserialize with `#[serde(default = "...")]` on every optional
//! field, resolve relative paths against the config file's directory.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// SQLite persistence settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".pomodex/pomodex.sqlite3")
}

/// Docker daemon and sandbox resource ceiling settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DockerConfig {
    #[serde(default = "default_docker_socket")]
    pub socket: String,

    /// Base sandbox image reference, used when a project has no snapshot yet.
    pub base_image: String,

    /// Inclusive SSH host-port allocation range.
    #[serde(default = "default_ssh_port_start")]
    pub ssh_port_range_start: u16,
    #[serde(default = "default_ssh_port_end")]
    pub ssh_port_range_end: u16,

    /// Memory cap in bytes. Fixed per spec.md §4.2 ("operator decision, not
    /// per-project"), not overridable per project.
    #[serde(default = "default_memory_limit_bytes")]
    pub memory_limit_bytes: i64,

    /// CPU cap expressed as `cpu_quota`/`cpu_period` (Docker CFS terms).
    #[serde(default = "default_cpu_period")]
    pub cpu_period: i64,
    #[serde(default = "default_cpu_quota")]
    pub cpu_quota: i64,

    /// Internal ttyd port inside the sandbox container (never host-mapped).
    #[serde(default = "default_ttyd_port")]
    pub ttyd_port: u16,

    /// Bridge subnet size for per-project networks (spec.md: "/24 to allow
    /// thousands of concurrent projects").
    #[serde(default = "default_bridge_subnet_bits")]
    pub bridge_subnet_bits: u8,

    #[serde(default = "default_max_port_retries")]
    pub max_port_retries: u32,

    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
}

fn default_docker_socket() -> String {
    "unix:///var/run/docker.sock".into()
}
fn default_ssh_port_start() -> u16 {
    30000
}
fn default_ssh_port_end() -> u16 {
    60000
}
fn default_memory_limit_bytes() -> i64 {
    1024 * 1024 * 1024
}
fn default_cpu_period() -> i64 {
    100_000
}
fn default_cpu_quota() -> i64 {
    100_000
}
fn default_ttyd_port() -> u16 {
    7681
}
fn default_bridge_subnet_bits() -> u8 {
    24
}
fn default_max_port_retries() -> u32 {
    5
}
fn default_stop_timeout_secs() -> u64 {
    30
}

/// Cloud IAM / object-store / image-registry settings (C3, C4).
#[derive(Debug, Clone, Deserialize)]
pub struct CloudConfig {
    pub project_id: String,
    pub bucket: String,
    #[serde(default = "default_shared_prefix")]
    pub shared_read_prefix: String,
    pub registry_base: String,
    #[serde(default = "default_iam_api_base")]
    pub iam_api_base: String,
    #[serde(default = "default_storage_api_base")]
    pub storage_api_base: String,
    /// Path to the control plane's own service-account key, used to sign
    /// requests to IAM/Storage REST APIs. Not a per-project key.
    pub control_plane_sa_key_path: PathBuf,
}

fn default_shared_prefix() -> String {
    "shared/".into()
}
fn default_iam_api_base() -> String {
    "https://iam.googleapis.com/v1".into()
}
fn default_storage_api_base() -> String {
    "https://storage.googleapis.com/storage/v1".into()
}

/// Auth Core (C1) settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub token_signing_key: String,
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl_secs: i64,
    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl_days: i64,
}

fn default_access_token_ttl() -> i64 {
    15 * 60
}
fn default_refresh_token_ttl() -> i64 {
    30
}

/// Inactivity Sweeper (C6) settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    #[serde(default = "default_sweeper_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_secs: i64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweeper_interval(),
            idle_threshold_secs: default_idle_threshold(),
        }
    }
}

fn default_sweeper_interval() -> u64 {
    300
}
fn default_idle_threshold() -> i64 {
    30 * 60
}

/// Resolve a possibly-relative path against a config file's parent directory.
pub fn resolve_path(path: &Path, base_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_path_keeps_absolute_paths() {
        let abs = PathBuf::from("/etc/pomodex/db.sqlite3");
        assert_eq!(resolve_path(&abs, Path::new("/home/x")), abs);
    }

    #[test]
    fn resolve_path_joins_relative_paths() {
        let rel = PathBuf::from("data/db.sqlite3");
        assert_eq!(
            resolve_path(&rel, Path::new("/etc/pomodex")),
            PathBuf::from("/etc/pomodex/data/db.sqlite3")
        );
    }
}
