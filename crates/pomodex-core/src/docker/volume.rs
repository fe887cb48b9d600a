use bollard::volume::CreateVolumeOptions;
use bollard::Docker;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Creates a named local volume for a project's agent home. A name
/// collision with an existing volume is idempotent.
pub async fn create_volume(docker: &Docker, name: &str) -> Result<()> {
    if docker.inspect_volume(name).await.is_ok() {
        debug!(volume = %name, "volume already exists, reusing");
        return Ok(());
    }

    let options = CreateVolumeOptions { name: name.to_string(), driver: "local".to_string(), ..Default::default() };

    docker.create_volume(options).await?;
    info!(volume = %name, "volume created");
    Ok(())
}

pub async fn remove_volume(docker: &Docker, name: &str) -> Result<()> {
    match docker.remove_volume(name, None).await {
        Ok(()) => {
            info!(volume = %name, "volume removed");
            Ok(())
        }
        Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(()),
        Err(e) => {
            warn!(volume = %name, error = %e, "failed to remove volume");
            Err(e.into())
        }
    }
}
