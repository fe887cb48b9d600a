use bollard::Docker;
use tracing::{error, info};

use crate::config::DockerConfig;
use crate::error::Result;
use crate::ids;

use super::{container, network, port, volume};

/// Input to `DockerManager::create_sandbox`. Built by the orchestrator
/// from project + cloud-IAM state.
pub struct ContainerConfig {
    pub container_name: String,
    pub volume_name: String,
    pub network_name: String,
    pub image: String,
    pub agent_home: String,
    pub ttyd_port: u16,
    pub ssh_host_port: u16,
    pub memory_limit_bytes: i64,
    pub cpu_quota: i64,
    pub cpu_period: i64,
    pub env: Vec<(String, String)>,
}

/// Owns the `bollard::Docker` handle and exposes the public operations
/// from the component contract: allocate_port, create_network,
/// create_volume, create_container, start/stop/delete_container,
/// get_container_ip, cleanup_project_resources.
pub struct DockerManager {
    docker: Docker,
    config: DockerConfig,
}

impl DockerManager {
    pub fn connect(config: DockerConfig) -> Result<Self> {
        let docker = Docker::connect_with_socket(&config.socket, 120, bollard::API_DEFAULT_VERSION)
            .map_err(|e| crate::error::PomodexError::Backend(format!("connecting to docker: {e}")))?;
        Ok(Self { docker, config })
    }

    pub fn config(&self) -> &DockerConfig {
        &self.config
    }

    pub fn allocate_port(&self) -> Result<u16> {
        let mut last_err = None;
        for _ in 0..self.config.max_port_retries {
            match port::allocate_port(self.config.ssh_port_range_start, self.config.ssh_port_range_end) {
                Ok(p) => return Ok(p),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| crate::error::PomodexError::Backend("port allocation exhausted".into())))
    }

    pub async fn create_network(&self, project_id: &str) -> Result<String> {
        let name = ids::network_name(project_id);
        network::create_network(&self.docker, &name).await?;
        Ok(name)
    }

    pub async fn create_volume(&self, project_id: &str) -> Result<String> {
        let name = ids::volume_name(project_id);
        volume::create_volume(&self.docker, &name).await?;
        Ok(name)
    }

    /// Creates network, volume, then the container in that order. On any
    /// failure past network/volume creation, compensates by removing both
    /// before returning the error — mirrors the saga's own compensation,
    /// but applies even if the caller never reaches the orchestrator layer.
    pub async fn create_sandbox(&self, project_id: &str, config: ContainerConfig) -> Result<()> {
        self.create_network(project_id).await?;
        self.create_volume(project_id).await?;

        if let Err(e) = container::create_container(&self.docker, &config).await {
            error!(project_id = %project_id, error = %e, "container creation failed, rolling back network+volume");
            let _ = volume::remove_volume(&self.docker, &config.volume_name).await;
            let _ = network::remove_network(&self.docker, &config.network_name).await;
            return Err(e);
        }

        Ok(())
    }

    pub async fn start_container(&self, project_id: &str) -> Result<()> {
        container::start_container(&self.docker, &ids::container_name(project_id)).await
    }

    pub async fn stop_container(&self, project_id: &str) -> Result<()> {
        container::stop_container(&self.docker, &ids::container_name(project_id), self.config.stop_timeout_secs).await
    }

    pub async fn delete_container(&self, project_id: &str) -> Result<()> {
        container::delete_container(&self.docker, &ids::container_name(project_id)).await
    }

    pub async fn get_container_ip(&self, project_id: &str) -> Result<String> {
        container::get_container_ip(
            &self.docker,
            &ids::container_name(project_id),
            &ids::network_name(project_id),
        )
        .await
    }

    /// Removes container, then volume, then network, in that order. Each
    /// step tolerates the resource already being gone.
    pub async fn cleanup_project_resources(&self, project_id: &str) -> Result<()> {
        let container_name = ids::container_name(project_id);
        let volume_name = ids::volume_name(project_id);
        let network_name = ids::network_name(project_id);

        container::delete_container(&self.docker, &container_name).await?;
        volume::remove_volume(&self.docker, &volume_name).await?;
        network::remove_network(&self.docker, &network_name).await?;

        info!(project_id = %project_id, "project docker resources cleaned up");
        Ok(())
    }

    pub fn docker(&self) -> &Docker {
        &self.docker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_port_honors_configured_range() {
        let config = DockerConfig {
            socket: "unix:///var/run/docker.sock".into(),
            base_image: "pomodex/base:latest".into(),
            ssh_port_range_start: 45000,
            ssh_port_range_end: 45010,
            memory_limit_bytes: 1 << 30,
            cpu_period: 100_000,
            cpu_quota: 100_000,
            ttyd_port: 7681,
            bridge_subnet_bits: 24,
            max_port_retries: 3,
            stop_timeout_secs: 30,
        };
        let manager = DockerManager { docker: Docker::connect_with_local_defaults().unwrap(), config };
        let port = manager.allocate_port().unwrap();
        assert!((45000..=45010).contains(&port));
    }
}
