use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PomodexError, Result};

/// Produces a short-lived bearer token authorized to call the cloud IAM
/// and Storage REST APIs on the control plane's own behalf. A trait seam
/// so tests can substitute a fixed token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct ServiceAccountKeyFile {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Serialize)]
struct JwtAssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchanges a service-account key file for OAuth2 access tokens using the
/// JWT bearer grant, the same flow a generated cloud SDK performs under
/// the hood, implemented directly since this stack has no such SDK.
pub struct FileTokenSource {
    client: Client,
    key: ServiceAccountKeyFile,
    scope: String,
}

impl FileTokenSource {
    pub fn load(key_path: &Path, scope: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(key_path)
            .map_err(|e| PomodexError::Backend(format!("reading service account key: {e}")))?;
        let key: ServiceAccountKeyFile = serde_json::from_str(&raw)
            .map_err(|e| PomodexError::Backend(format!("parsing service account key: {e}")))?;

        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .map_err(|e| PomodexError::Backend(format!("building http client: {e}")))?,
            key,
            scope: scope.to_string(),
        })
    }

    fn sign_assertion(&self, now: i64) -> Result<String> {
        let claims = JwtAssertionClaims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + 3600,
        };

        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| PomodexError::Backend(format!("invalid service account private key: {e}")))?;

        encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| PomodexError::Backend(format!("signing jwt assertion: {e}")))
    }
}

#[async_trait]
impl TokenSource for FileTokenSource {
    async fn access_token(&self) -> Result<String> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64;
        let assertion = self.sign_assertion(now)?;

        debug!(issuer = %self.key.client_email, "exchanging jwt assertion for access token");

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &assertion),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PomodexError::Transient(format!("token exchange failed: {status} {body}")));
        }

        let parsed: TokenResponse = response.json().await?;
        Ok(parsed.access_token)
    }
}
