//! Generative-backend credential resolution.
//!
//! Resolved exactly once at startup: the managed secret store is preferred,
//! the statically configured `GEMINI_API_KEY` is the fallback, and if neither
//! yields a key the backend stays in placeholder mode for the process
//! lifetime. A transient secret-store outage at boot therefore degrades the
//! service instead of blocking startup.

use base64::Engine;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ServiceConfig;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const SECRET_NAME: &str = "gemini-api-key";

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("http error: {0}")]
    Http(String),
    #[error("unexpected payload: {0}")]
    Payload(String),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct AccessSecretResponse {
    payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: String,
}

/// Fetch a bearer token from the GCE metadata server. Also used by the
/// asset store to authorize object-storage writes.
pub(crate) async fn metadata_token(client: &reqwest::Client) -> Result<String, SecretError> {
    let response = client
        .get(METADATA_TOKEN_URL)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|e| SecretError::Http(e.to_string()))?;
    if !response.status().is_success() {
        return Err(SecretError::Http(format!("metadata server returned {}", response.status())));
    }
    let token: TokenResponse = response.json().await.map_err(|e| SecretError::Payload(e.to_string()))?;
    Ok(token.access_token)
}

async fn fetch_from_secret_store(
    client: &reqwest::Client,
    project_id: &str,
) -> Result<String, SecretError> {
    let token = metadata_token(client).await?;
    let url = format!(
        "https://secretmanager.googleapis.com/v1/projects/{project_id}/secrets/{SECRET_NAME}/versions/latest:access"
    );
    let response = client
        .get(&url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(|e| SecretError::Http(e.to_string()))?;
    if !response.status().is_success() {
        return Err(SecretError::Http(format!("secret store returned {}", response.status())));
    }
    let body: AccessSecretResponse = response.json().await.map_err(|e| SecretError::Payload(e.to_string()))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(body.payload.data.as_bytes())
        .map_err(|e| SecretError::Payload(format!("secret payload is not base64: {e}")))?;
    String::from_utf8(bytes).map_err(|e| SecretError::Payload(format!("secret payload is not utf-8: {e}")))
}

/// Resolve the generative-backend API key, preferring the secret store and
/// falling back to the configured static value. `None` means the backend is
/// unavailable for the process lifetime.
pub async fn resolve_api_key(cfg: &ServiceConfig, client: &reqwest::Client) -> Option<String> {
    match fetch_from_secret_store(client, &cfg.project_id).await {
        Ok(key) if !key.trim().is_empty() => {
            info!("resolved API key from secret store");
            return Some(key.trim().to_string());
        }
        Ok(_) => warn!("secret store returned an empty key, falling back to GEMINI_API_KEY"),
        Err(err) => warn!(error = %err, "failed to read API key from secret store, falling back to GEMINI_API_KEY"),
    }
    cfg.gemini_api_key.clone()
}
