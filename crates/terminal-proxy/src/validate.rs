//! Calls the project service's `/internal/validate` endpoint to check a
//! presented access token and project ownership before dialing upstream.

use serde::{Deserialize, Serialize};

use crate::config::ControlPlaneConfig;

#[derive(Debug, Serialize)]
struct ValidateRequest<'a> {
    token: &'a str,
    project_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    user_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("validation request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Returns the owning user id on success. Any non-200 response, timeout,
/// or connection failure is surfaced as `Unauthorized` — the proxy closes
/// with 4401 either way, per spec, rather than distinguishing "control
/// plane down" from "bad token" to a client that shouldn't learn which.
pub async fn validate(client: &reqwest::Client, config: &ControlPlaneConfig, token: &str, project_id: &str) -> Result<String, ValidateError> {
    let response = client
        .post(&config.validate_url)
        .header("x-internal-secret", &config.internal_shared_secret)
        .json(&ValidateRequest { token, project_id })
        .timeout(std::time::Duration::from_secs(config.validate_timeout_secs))
        .send()
        .await;

    let response = match response {
        Ok(r) => r,
        Err(_) => return Err(ValidateError::Unauthorized),
    };

    if !response.status().is_success() {
        return Err(ValidateError::Unauthorized);
    }

    let parsed: ValidateResponse = response.json().await.map_err(|_| ValidateError::Unauthorized)?;
    Ok(parsed.user_id)
}
