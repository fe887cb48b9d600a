//! Deterministic name derivation for external resources.
//!
//! All names are derived purely from the project id so that a crashed
//! saga can be recognized and cleaned up on retry without extra state
//! (see `cleanup_project_resources` idempotence requirement).

/// Docker container name for a project.
pub fn container_name(project_id: &str) -> String {
    format!("sandbox-{project_id}")
}

/// Docker named-volume name for a project.
pub fn volume_name(project_id: &str) -> String {
    format!("vol-{project_id}")
}

/// Docker bridge network name for a project.
pub fn network_name(project_id: &str) -> String {
    format!("net-{project_id}")
}

/// Object-store prefix reserved for a project's backups.
pub fn object_prefix(project_id: &str) -> String {
    format!("projects/{project_id}/")
}

/// Deterministic cloud service-account id for a project.
///
/// Cloud IAM service account ids must be 6-30 characters, lowercase
/// letters/digits/hyphens. Project ids are UUIDs (36 chars with hyphens),
/// so we take a stable, collision-resistant slice and prefix it to stay
/// within the constraint.
pub fn service_account_id(project_id: &str) -> String {
    let cleaned: String = project_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let mut id = format!("pomodex-{cleaned}");
    id.truncate(30);
    while id.len() < 6 {
        id.push('0');
    }
    id
}

/// Image reference for a project's `latest` snapshot tag.
pub fn latest_image_ref(registry_base: &str, project_id: &str) -> String {
    format!("{registry_base}/{project_id}:latest")
}

/// Image reference for a project's timestamped snapshot tag.
pub fn timestamped_image_ref(registry_base: &str, project_id: &str, timestamp: i64) -> String {
    format!("{registry_base}/{project_id}:{timestamp}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_names_match_pattern() {
        let id = "abc-123";
        assert_eq!(container_name(id), "sandbox-abc-123");
        assert_eq!(volume_name(id), "vol-abc-123");
        assert_eq!(network_name(id), "net-abc-123");
        assert_eq!(object_prefix(id), "projects/abc-123/");
    }

    #[test]
    fn service_account_id_is_within_cloud_bounds() {
        let short = service_account_id("a1");
        assert!(short.len() >= 6 && short.len() <= 30);

        let long = service_account_id("11111111-2222-3333-4444-555555555555");
        assert!(long.len() >= 6 && long.len() <= 30);
        assert!(long.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }
}
