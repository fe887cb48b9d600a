use std::collections::HashMap;

use bollard::network::{CreateNetworkOptions, ListNetworksOptions};
use bollard::Docker;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Creates an isolated bridge network for one project, IPv6 disabled.
/// Subnet sizing is left to Docker's default address pool, which hands out
/// /24s per network — enough for thousands of concurrent projects without
/// the control plane tracking CIDR allocation itself. A name collision
/// with an existing network of the same name is treated as already-created
/// (idempotent retry after a crashed saga).
pub async fn create_network(docker: &Docker, name: &str) -> Result<()> {
    if network_exists(docker, name).await? {
        debug!(network = %name, "network already exists, reusing");
        return Ok(());
    }

    let options = CreateNetworkOptions {
        name: name.to_string(),
        driver: "bridge".to_string(),
        check_duplicate: true,
        enable_ipv6: false,
        ..Default::default()
    };

    match docker.create_network(options).await {
        Ok(_) => {
            info!(network = %name, "network created");
            Ok(())
        }
        Err(bollard::errors::Error::DockerResponseServerError { status_code: 409, .. }) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub async fn network_exists(docker: &Docker, name: &str) -> Result<bool> {
    let filters: HashMap<String, Vec<String>> =
        [("name".to_string(), vec![name.to_string()])].into_iter().collect();

    let networks = docker.list_networks(Some(ListNetworksOptions { filters })).await?;
    Ok(networks.iter().any(|n| n.name.as_deref() == Some(name)))
}

pub async fn remove_network(docker: &Docker, name: &str) -> Result<()> {
    match docker.remove_network(name).await {
        Ok(()) => {
            info!(network = %name, "network removed");
            Ok(())
        }
        Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(()),
        Err(e) => {
            warn!(network = %name, error = %e, "failed to remove network");
            Err(e.into())
        }
    }
}
