use std::collections::HashMap;

use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{DeviceMapping, HostConfig, Mount, MountTypeEnum, PortBinding, RestartPolicy, RestartPolicyNameEnum};
use bollard::Docker;
use futures_util::StreamExt;
use tracing::{debug, info, warn};

use crate::error::Result;

use super::manager::ContainerConfig;

/// Capabilities dropped from the sandbox container. `SYS_ADMIN` is kept
/// (not dropped) because the in-container backup agent mounts the
/// object-store prefix with FUSE; `/dev/fuse` is attached for the same
/// reason.
fn dropped_capabilities() -> Vec<String> {
    vec![
        "setpcap", "mknod", "audit_write", "net_raw", "dac_override", "fowner", "fsetid",
        "net_bind_service", "sys_chroot", "setfcap", "audit_control", "audit_read",
        "block_suspend", "dac_read_search",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub async fn create_container(docker: &Docker, config: &ContainerConfig) -> Result<()> {
    ensure_image_exists(docker, &config.image).await?;

    let env_vars: Vec<String> = config.env.iter().map(|(k, v)| format!("{k}={v}")).collect();

    let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::from([(
        "22/tcp".to_string(),
        Some(vec![PortBinding {
            host_ip: Some("0.0.0.0".to_string()),
            host_port: Some(config.ssh_host_port.to_string()),
        }]),
    )]);

    // ttyd is reached over the sandbox's private network by the terminal
    // proxy, never published on the host.
    let exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::from([("22/tcp".to_string(), HashMap::new())]);

    let mounts = vec![Mount {
        target: Some(config.agent_home.clone()),
        source: Some(config.volume_name.clone()),
        typ: Some(MountTypeEnum::VOLUME),
        read_only: Some(false),
        ..Default::default()
    }];

    let host_config = HostConfig {
        port_bindings: Some(port_bindings),
        mounts: Some(mounts),
        memory: Some(config.memory_limit_bytes),
        memory_reservation: Some((config.memory_limit_bytes as f64 * 0.9) as i64),
        cpu_quota: Some(config.cpu_quota),
        cpu_period: Some(config.cpu_period),
        cap_drop: Some(dropped_capabilities()),
        cap_add: Some(vec!["SYS_ADMIN".to_string()]),
        devices: Some(vec![DeviceMapping {
            path_on_host: Some("/dev/fuse".to_string()),
            path_in_container: Some("/dev/fuse".to_string()),
            cgroup_permissions: Some("rwm".to_string()),
        }]),
        security_opt: Some(vec!["no-new-privileges".to_string()]),
        network_mode: Some(config.network_name.clone()),
        restart_policy: Some(RestartPolicy { name: Some(RestartPolicyNameEnum::NO), ..Default::default() }),
        ..Default::default()
    };

    let container_config = Config {
        image: Some(config.image.clone()),
        env: Some(env_vars),
        exposed_ports: Some(exposed_ports),
        host_config: Some(host_config),
        working_dir: Some(config.agent_home.clone()),
        tty: Some(true),
        ..Default::default()
    };

    let options = CreateContainerOptions { name: config.container_name.clone(), platform: None };

    docker.create_container(Some(options), container_config).await.map_err(|e| {
        if let bollard::errors::Error::DockerResponseServerError { status_code: 409, .. } = e {
            crate::error::PomodexError::Conflict(format!("container {} already exists", config.container_name))
        } else {
            e.into()
        }
    })?;

    docker
        .start_container(&config.container_name, None::<StartContainerOptions<String>>)
        .await?;

    info!(container = %config.container_name, "sandbox container created and started");
    Ok(())
}

pub async fn start_container(docker: &Docker, name: &str) -> Result<()> {
    match docker.start_container(name, None::<StartContainerOptions<String>>).await {
        Ok(()) => Ok(()),
        Err(bollard::errors::Error::DockerResponseServerError { status_code: 304, .. }) => Ok(()),
        Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {
            Err(crate::error::PomodexError::NotFound(format!("container {name} not found")))
        }
        Err(e) => Err(e.into()),
    }
}

/// Graceful stop with a 30s timeout before Docker sends SIGKILL. Missing
/// container is a no-op.
pub async fn stop_container(docker: &Docker, name: &str, timeout_secs: u64) -> Result<()> {
    match docker.stop_container(name, Some(StopContainerOptions { t: timeout_secs as i64 })).await {
        Ok(()) => Ok(()),
        Err(bollard::errors::Error::DockerResponseServerError { status_code: 304, .. }) => Ok(()),
        Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub async fn kill_container(docker: &Docker, name: &str, signal: &str) -> Result<()> {
    match docker.kill_container(name, Some(KillContainerOptions { signal })).await {
        Ok(()) => Ok(()),
        Err(bollard::errors::Error::DockerResponseServerError { status_code: 404 | 409, .. }) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub async fn delete_container(docker: &Docker, name: &str) -> Result<()> {
    let options = RemoveContainerOptions { force: true, v: false, ..Default::default() };
    match docker.remove_container(name, Some(options)).await {
        Ok(()) => {
            info!(container = %name, "container removed");
            Ok(())
        }
        Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {
            debug!(container = %name, "container already absent");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn get_container_ip(docker: &Docker, name: &str, network_name: &str) -> Result<String> {
    let info = docker.inspect_container(name, None).await.map_err(|e| {
        if let bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } = e {
            crate::error::PomodexError::NotFound(format!("container {name} not found"))
        } else {
            e.into()
        }
    })?;

    let running = info.state.as_ref().and_then(|s| s.running).unwrap_or(false);
    if !running {
        return Err(crate::error::PomodexError::Precondition(format!("container {name} is not running")));
    }

    info.network_settings
        .and_then(|ns| ns.networks)
        .and_then(|nets| nets.get(network_name).cloned())
        .and_then(|n| n.ip_address)
        .filter(|ip| !ip.is_empty())
        .ok_or_else(|| {
            crate::error::PomodexError::NotFound(format!("container {name} has no address on {network_name}"))
        })
}

async fn ensure_image_exists(docker: &Docker, image: &str) -> Result<()> {
    if docker.inspect_image(image).await.is_ok() {
        return Ok(());
    }

    let options = CreateImageOptions { from_image: image.to_string(), ..Default::default() };
    let mut stream = docker.create_image(Some(options), None, None);

    while let Some(result) = stream.next().await {
        match result {
            Ok(info) => {
                if let Some(status) = info.status {
                    debug!(image = %image, status = %status, "pulling image");
                }
            }
            Err(e) => {
                warn!(image = %image, error = %e, "image pull failed");
                return Err(e.into());
            }
        }
    }

    info!(image = %image, "image pulled");
    Ok(())
}
