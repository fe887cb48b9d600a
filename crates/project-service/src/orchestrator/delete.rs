use pomodex_core::db::ProjectStatus;
use pomodex_core::error::{PomodexError, Result};
use pomodex_core::snapshot;
use tracing::{info, warn};

use super::Orchestrator;

/// Every external removal here is independently idempotent, so retrying
/// a delete after a partial failure converges instead of compounding.
pub async fn run(orch: &Orchestrator, project_id: &str, user_id: &str) -> Result<()> {
    let project = orch
        .db
        .projects()
        .find_by_id_for_user(project_id, user_id)
        .await?
        .ok_or_else(|| PomodexError::NotFound(project_id.to_string()))?;

    orch.db.projects().set_status(project_id, ProjectStatus::Deleting).await?;

    if let Err(e) = orch.docker.cleanup_project_resources(project_id).await {
        warn!(project_id = %project_id, error = %e, "docker cleanup failed during delete, continuing");
    }

    if let Some(sa_email) = &project.cloud_sa_email {
        if let Err(e) = orch.iam.delete_service_account(sa_email).await {
            warn!(project_id = %project_id, error = %e, "service account deletion failed during delete, continuing");
        }
    }

    if let Err(e) = snapshot::delete_snapshot_images(orch.docker.docker(), &orch.config.cloud.registry_base, project_id).await {
        warn!(project_id = %project_id, error = %e, "snapshot image deletion failed during delete, continuing");
    }

    orch.db.projects().delete(project_id).await?;
    info!(project_id = %project_id, "project deleted");
    Ok(())
}
