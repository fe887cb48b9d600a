use chrono::Utc;
use pomodex_core::db::ProjectStatus;
use pomodex_core::docker::ContainerConfig;
use pomodex_core::error::{PomodexError, Result};
use pomodex_core::ids;
use pomodex_core::snapshot;
use tracing::{error, info};

use super::Orchestrator;

/// Restore is exposed as a plain alias for start (open question in the
/// design notes, decided in favor of the simpler surface: there's a
/// single `:latest` snapshot tag per project, not a tag picker).
pub async fn run(orch: &Orchestrator, project_id: &str, user_id: &str) -> Result<()> {
    let project = orch
        .db
        .projects()
        .find_by_id_for_user(project_id, user_id)
        .await?
        .ok_or_else(|| PomodexError::NotFound(project_id.to_string()))?;

    if project.status != ProjectStatus::Stopped {
        return Err(PomodexError::Precondition(format!(
            "project is {}, not stopped",
            project.status
        )));
    }

    orch.db.projects().set_status(project_id, ProjectStatus::Restoring).await?;

    let base_image = orch.docker.config().base_image.clone();
    let image = snapshot::image_for_project(project.snapshot_image_ref.as_deref().unwrap_or(""), &base_image);

    let sa_key = project.cloud_sa_key.as_deref();
    if let Err(e) = snapshot::pull_for_restore(orch.docker.docker(), &image, sa_key).await {
        error!(project_id = %project_id, error = %e, "pulling restore image failed");
        orch.db.projects().set_status(project_id, ProjectStatus::Error).await?;
        return Err(e);
    }

    // The stopped container still exists but pins the old image; drop it
    // and recreate from the chosen image, keeping the same volume,
    // network and host port so nothing else about the project changes.
    if let Err(e) = orch.docker.delete_container(project_id).await {
        error!(project_id = %project_id, error = %e, "removing stopped container before restore");
        orch.db.projects().set_status(project_id, ProjectStatus::Error).await?;
        return Err(e);
    }

    let ssh_host_port = project.ssh_host_port.unwrap_or(0) as u16;
    let docker_config = orch.docker.config();
    let container_config = ContainerConfig {
        container_name: ids::container_name(project_id),
        volume_name: ids::volume_name(project_id),
        network_name: ids::network_name(project_id),
        image,
        agent_home: "/home/agent".to_string(),
        ttyd_port: docker_config.ttyd_port,
        ssh_host_port,
        memory_limit_bytes: docker_config.memory_limit_bytes,
        cpu_quota: docker_config.cpu_quota,
        cpu_period: docker_config.cpu_period,
        env: Vec::new(),
    };

    if let Err(e) = orch.docker.create_sandbox(project_id, container_config).await {
        error!(project_id = %project_id, error = %e, "recreating container for restore");
        orch.db.projects().set_status(project_id, ProjectStatus::Error).await?;
        return Err(e);
    }
    if let Err(e) = orch.docker.start_container(project_id).await {
        error!(project_id = %project_id, error = %e, "starting restored container");
        orch.db.projects().set_status(project_id, ProjectStatus::Error).await?;
        return Err(e);
    }

    orch.db
        .projects()
        .set_container_info(project_id, Some(ssh_host_port as i64), ProjectStatus::Running)
        .await?;
    orch.db.projects().touch_active(project_id, Utc::now().timestamp()).await?;

    info!(project_id = %project_id, "project restored and running");
    Ok(())
}
