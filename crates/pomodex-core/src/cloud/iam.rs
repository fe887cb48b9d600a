use std::sync::Arc;

use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::config::CloudConfig;
use crate::error::{PomodexError, Result};
use crate::ids;

use super::token_source::TokenSource;

/// A minted service-account key, returned to the caller once. Only
/// `key_json` is persisted by the orchestrator; nothing else from this
/// exchange is recoverable afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountCredential {
    pub email: String,
    pub key_json: String,
}

/// Creates/deletes per-project service accounts and applies the IAM
/// bindings that scope each one to its own object-store prefix.
pub struct GcpIamManager {
    client: Client,
    tokens: Arc<dyn TokenSource>,
    config: CloudConfig,
}

#[derive(Deserialize)]
struct ServiceAccountResponse {
    email: String,
}

#[derive(Deserialize)]
struct IamPolicy {
    etag: String,
    #[serde(default)]
    bindings: Vec<serde_json::Value>,
}

impl GcpIamManager {
    pub fn new(client: Client, tokens: Arc<dyn TokenSource>, config: CloudConfig) -> Self {
        Self { client, tokens, config }
    }

    /// Creates the SA, mints a key, and applies the conditional IAM
    /// binding restricting it to `projects/<id>/*` plus a read grant on
    /// the shared prefix. The whole sequence is one logical step in the
    /// create saga; callers undo it with `delete_service_account`.
    pub async fn provision_for_project(&self, project_id: &str) -> Result<ServiceAccountCredential> {
        let account_id = ids::service_account_id(project_id);
        let email = self.create_service_account(&account_id, project_id).await?;
        let key_json = self.create_key(&email).await?;
        self.apply_bucket_bindings(&email, project_id).await?;
        info!(project_id = %project_id, sa = %email, "provisioned cloud service account");
        Ok(ServiceAccountCredential { email, key_json })
    }

    async fn create_service_account(&self, account_id: &str, project_id: &str) -> Result<String> {
        let token = self.tokens.access_token().await?;
        let url = format!(
            "{}/projects/{}/serviceAccounts",
            self.config.iam_api_base, self.config.project_id
        );

        let body = json!({
            "accountId": account_id,
            "serviceAccount": { "displayName": format!("pomodex sandbox {project_id}") },
        });

        let response = self.client.post(&url).bearer_auth(&token).json(&body).send().await?;
        if response.status() == reqwest::StatusCode::CONFLICT {
            return Ok(format!("{account_id}@{}.iam.gserviceaccount.com", self.config.project_id));
        }
        Self::ensure_success(&response).await?;
        let parsed: ServiceAccountResponse = response.json().await?;
        Ok(parsed.email)
    }

    async fn create_key(&self, sa_email: &str) -> Result<String> {
        let token = self.tokens.access_token().await?;
        let url = format!(
            "{}/projects/-/serviceAccounts/{sa_email}/keys",
            self.config.iam_api_base
        );

        let response = self.client.post(&url).bearer_auth(&token).json(&json!({})).send().await?;
        Self::ensure_success(&response).await?;

        #[derive(Deserialize)]
        struct KeyResponse {
            #[serde(rename = "privateKeyData")]
            private_key_data: String,
        }
        let parsed: KeyResponse = response.json().await?;

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(parsed.private_key_data)
            .map_err(|e| PomodexError::Backend(format!("decoding service account key: {e}")))?;
        String::from_utf8(decoded).map_err(|e| PomodexError::Backend(format!("invalid key encoding: {e}")))
    }

    /// Grants object admin on `projects/<id>/*` and read on the shared
    /// prefix via a condition expression, so SA for project P can never
    /// read or write project Q's objects.
    ///
    /// `setIamPolicy` replaces the bucket's whole policy, so this reads the
    /// current policy first and appends to its bindings rather than
    /// overwriting them — otherwise provisioning project Q would wipe out
    /// project P's binding.
    async fn apply_bucket_bindings(&self, sa_email: &str, project_id: &str) -> Result<()> {
        let token = self.tokens.access_token().await?;
        let url = format!(
            "{}/b/{}/iam?optionsRequestedPolicyVersion=3",
            self.config.storage_api_base, self.config.bucket
        );
        let prefix = ids::object_prefix(project_id);

        let get_response = self.client.get(&url).bearer_auth(&token).send().await?;
        Self::ensure_success(&get_response).await?;
        let mut policy: IamPolicy = get_response.json().await?;

        policy.bindings.push(json!({
            "role": "roles/storage.objectAdmin",
            "members": [format!("serviceAccount:{sa_email}")],
            "condition": {
                "title": format!("pomodex-{project_id}-scope"),
                "expression": format!(
                    "resource.name.startsWith(\"projects/_/buckets/{}/objects/{}\")",
                    self.config.bucket, prefix
                ),
            },
        }));
        policy.bindings.push(json!({
            "role": "roles/storage.objectViewer",
            "members": [format!("serviceAccount:{sa_email}")],
            "condition": {
                "title": format!("pomodex-{project_id}-shared-read"),
                "expression": format!(
                    "resource.name.startsWith(\"projects/_/buckets/{}/objects/{}\")",
                    self.config.bucket, self.config.shared_read_prefix
                ),
            },
        }));

        let body = json!({
            "version": 3,
            "bindings": policy.bindings,
            "etag": policy.etag,
        });

        let response = self.client.put(&url).bearer_auth(&token).json(&body).send().await?;
        Self::ensure_success(&response).await?;
        Ok(())
    }

    /// Removes the SA (and with it, all its keys). Missing SA is not an
    /// error: the orchestrator may call this on a project that never
    /// finished provisioning.
    pub async fn delete_service_account(&self, sa_email: &str) -> Result<()> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/projects/-/serviceAccounts/{sa_email}", self.config.iam_api_base);

        let response = self.client.delete(&url).bearer_auth(&token).send().await?;
        match response.status() {
            reqwest::StatusCode::OK | reqwest::StatusCode::NOT_FOUND => Ok(()),
            status => {
                warn!(sa = %sa_email, status = %status, "service account deletion failed");
                Err(PomodexError::Backend(format!("deleting service account {sa_email}: {status}")))
            }
        }
    }

    async fn ensure_success(response: &reqwest::Response) -> Result<()> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(PomodexError::Backend(format!("cloud api returned {}", response.status())))
        }
    }
}
