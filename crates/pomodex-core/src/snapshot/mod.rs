//! Snapshot Manager (C4): commit/push/pull project sandbox images.

use bollard::auth::DockerCredentials;
use bollard::container::Config;
use bollard::image::{CommitContainerOptions, CreateImageOptions, PushImageOptions, RemoveImageOptions};
use bollard::Docker;
use chrono::Utc;
use futures_util::StreamExt;
use tracing::{info, warn};

use crate::error::Result;
use crate::ids;

#[derive(Debug, Clone)]
pub struct SnapshotResult {
    pub image_ref: String,
    pub last_snapshot_at: i64,
}

/// Registry auth for the per-process service-account key, per the image
/// registry's convention for key-based pushes: username `_json_key`,
/// password is the raw key JSON.
fn registry_credentials(sa_key_json: &str) -> DockerCredentials {
    DockerCredentials {
        username: Some("_json_key".to_string()),
        password: Some(sa_key_json.to_string()),
        ..Default::default()
    }
}

/// Commits the running container, tags it `<registry>/<pid>:<timestamp>`
/// and `<registry>/<pid>:latest`, and pushes both. The caller (C5) is
/// responsible for having already triggered the in-container copy to the
/// object store and for stopping the container and persisting metadata
/// afterward — committing before that copy finishes would miss freshly
/// written files.
pub async fn snapshot(
    docker: &Docker,
    project_id: &str,
    registry_base: &str,
    sa_key_json: &str,
) -> Result<SnapshotResult> {
    let container_name = ids::container_name(project_id);
    let timestamp = Utc::now().timestamp();
    let timestamped_ref = ids::timestamped_image_ref(registry_base, project_id, timestamp);
    let latest_ref = ids::latest_image_ref(registry_base, project_id);

    let commit_options = CommitContainerOptions {
        container: container_name.clone(),
        repo: timestamped_ref.clone(),
        tag: String::new(),
        comment: "pomodex snapshot".to_string(),
        author: "pomodex".to_string(),
        pause: false,
        changes: None,
    };
    docker.commit_container(commit_options, Config::<String>::default()).await?;

    let latest_repo = format!("{registry_base}/{project_id}");
    docker
        .tag_image(&timestamped_ref, Some(bollard::image::TagImageOptions { repo: latest_repo, tag: "latest".to_string() }))
        .await?;

    let credentials = registry_credentials(sa_key_json);
    push_image(docker, &timestamped_ref, &credentials).await?;
    push_image(docker, &latest_ref, &credentials).await?;

    info!(project_id = %project_id, image = %timestamped_ref, "snapshot pushed");
    Ok(SnapshotResult { image_ref: latest_ref, last_snapshot_at: timestamp })
}

async fn push_image(docker: &Docker, image_ref: &str, credentials: &DockerCredentials) -> Result<()> {
    let (repo, tag) = image_ref.rsplit_once(':').unwrap_or((image_ref, "latest"));
    let options = PushImageOptions { tag };
    let mut stream = docker.push_image(repo, Some(options), Some(credentials.clone()));

    while let Some(result) = stream.next().await {
        result?;
    }
    Ok(())
}

/// Pulls `image_ref`, used before creating a container from a snapshot or
/// restoring from the base image.
pub async fn pull_for_restore(docker: &Docker, image_ref: &str, sa_key_json: Option<&str>) -> Result<()> {
    let credentials = sa_key_json.map(registry_credentials);
    let options = CreateImageOptions { from_image: image_ref.to_string(), ..Default::default() };
    let mut stream = docker.create_image(Some(options), None, credentials);

    while let Some(result) = stream.next().await {
        result?;
    }
    Ok(())
}

/// Pure selector: a project's active image is its own snapshot once one
/// exists, otherwise the shared base image.
pub fn image_for_project(snapshot_ref: &str, base_ref: &str) -> String {
    if snapshot_ref.is_empty() {
        base_ref.to_string()
    } else {
        snapshot_ref.to_string()
    }
}

/// Removes every tag under `<registry>/<pid>` from the registry's local
/// cache view. Registry-side retention ("keep N most recent") is handled
/// out-of-band by the registry itself; this only removes local references
/// so the host doesn't accumulate every historical snapshot.
pub async fn delete_snapshot_images(docker: &Docker, registry_base: &str, project_id: &str) -> Result<()> {
    let repo = format!("{registry_base}/{project_id}");
    let filters = std::collections::HashMap::from([("reference".to_string(), vec![format!("{repo}:*")])]);

    let images = docker
        .list_images(Some(bollard::image::ListImagesOptions { all: true, filters, ..Default::default() }))
        .await?;

    for image in images {
        if let Err(e) = docker.remove_image(&image.id, Some(RemoveImageOptions { force: true, ..Default::default() }), None).await {
            warn!(image = %image.id, error = %e, "failed to remove snapshot image");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_for_project_prefers_snapshot() {
        assert_eq!(image_for_project("registry/p1:latest", "registry/base:latest"), "registry/p1:latest");
    }

    #[test]
    fn image_for_project_falls_back_to_base() {
        assert_eq!(image_for_project("", "registry/base:latest"), "registry/base:latest");
    }
}
