use chrono::Utc;
use pomodex_core::db::ProjectStatus;
use pomodex_core::error::{PomodexError, Result};
use pomodex_core::snapshot;
use tracing::{error, info};

use super::Orchestrator;

pub async fn run(orch: &Orchestrator, project_id: &str, user_id: &str) -> Result<()> {
    let project = orch
        .db
        .projects()
        .find_by_id_for_user(project_id, user_id)
        .await?
        .ok_or_else(|| PomodexError::NotFound(project_id.to_string()))?;

    if project.status != ProjectStatus::Running {
        return Err(PomodexError::Precondition(format!(
            "project is {}, not running",
            project.status
        )));
    }

    stop_inner(orch, project_id, &project.cloud_sa_key).await
}

/// Used by the sweeper, which already resolved the project by status scan
/// and has no user id to re-check ownership against.
pub async fn run_unscoped(orch: &Orchestrator, project_id: &str) -> Result<()> {
    let project = orch
        .db
        .projects()
        .find_by_id(project_id)
        .await?
        .ok_or_else(|| PomodexError::NotFound(project_id.to_string()))?;

    if project.status != ProjectStatus::Running {
        return Err(PomodexError::Precondition(format!(
            "project is {}, not running",
            project.status
        )));
    }

    stop_inner(orch, project_id, &project.cloud_sa_key).await
}

async fn stop_inner(orch: &Orchestrator, project_id: &str, cloud_sa_key: &Option<String>) -> Result<()> {
    orch.db.projects().set_status(project_id, ProjectStatus::Snapshotting).await?;

    let sa_key = cloud_sa_key.clone().unwrap_or_default();
    let snapshot_result = snapshot::snapshot(orch.docker.docker(), project_id, &orch.config.cloud.registry_base, &sa_key).await;

    let snapshot_result = match snapshot_result {
        Ok(result) => result,
        Err(e) => {
            error!(project_id = %project_id, error = %e, "snapshot failed, leaving project in error");
            orch.db.projects().set_status(project_id, ProjectStatus::Error).await?;
            return Err(e);
        }
    };

    orch.db
        .projects()
        .set_snapshot_info(project_id, &snapshot_result.image_ref, snapshot_result.last_snapshot_at)
        .await?;
    orch.db.projects().touch_backup(project_id, Utc::now().timestamp()).await?;

    if let Err(e) = orch.docker.stop_container(project_id).await {
        error!(project_id = %project_id, error = %e, "container stop failed after successful snapshot");
        orch.db.projects().set_status(project_id, ProjectStatus::Error).await?;
        return Err(e);
    }

    orch.db.projects().set_status(project_id, ProjectStatus::Stopped).await?;
    info!(project_id = %project_id, "project stopped");
    Ok(())
}
