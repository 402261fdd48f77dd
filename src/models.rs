use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

fn default_quantity() -> u32 { 1 }
fn default_style() -> String { "modern".to_string() }

/// One cart line as received from a client or the cart service.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CartItem {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

/// Internal request model shared by every protocol façade.
///
/// At least one of `cart_items` or `user_id` must be non-empty; the
/// orchestrator rejects the request otherwise without creating a job.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GenerationRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default = "default_style")]
    pub style_preference: String,
    #[serde(default)]
    pub background_image_url: String,
    #[serde(default)]
    pub cart_items: Vec<CartItem>,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            style_preference: default_style(),
            background_image_url: String::new(),
            cart_items: Vec::new(),
        }
    }
}

/// Product record as returned by the product catalog.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub picture: String,
}

/// A cart item enriched with catalog detail. Quantity is copied from the
/// originating cart line.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProductDetail {
    pub id: String,
    pub name: String,
    pub description: String,
    pub picture: String,
    pub quantity: u32,
}

/// Lifecycle state of a generation job. `NotFound` is only ever synthesized
/// for queries against unknown ids; it is never stored.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
    NotFound,
}

/// Status record for one asynchronous generation attempt. Owned exclusively
/// by the status store; the orchestrator is the only writer.
#[derive(Debug, Serialize, Clone)]
pub struct GenerationJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub owner: String,
    pub progress: u8,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl GenerationJob {
    /// Synthesized record for a query against an id the store has never seen.
    pub fn not_found(generation_id: &str) -> Self {
        Self {
            id: Uuid::nil(),
            status: JobStatus::NotFound,
            owner: String::new(),
            progress: 0,
            result_url: None,
            error_message: Some(format!("Generation ID {generation_id} not found")),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Success,
    Failed,
}

/// Result of one background upload. Ephemeral, returned to the caller and
/// not retained.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UploadedAsset {
    pub url: String,
    pub status: AssetStatus,
    pub error_message: Option<String>,
}

impl UploadedAsset {
    pub fn success(url: String) -> Self {
        Self { url, status: AssetStatus::Success, error_message: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { url: String::new(), status: AssetStatus::Failed, error_message: Some(message.into()) }
    }
}

/// Terminal outcome of one generate call, before façade translation.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub generation_id: Uuid,
    pub status: JobStatus,
    pub image_url: String,
    pub error_message: String,
}

// --- Wire DTOs shared by the RPC and HTTP façades ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GenerateCartImageResponse {
    pub image_url: String,
    pub generation_id: String,
    pub status: JobStatus,
    pub error_message: String,
}

impl From<GenerationOutcome> for GenerateCartImageResponse {
    fn from(outcome: GenerationOutcome) -> Self {
        Self {
            image_url: outcome.image_url,
            generation_id: outcome.generation_id.to_string(),
            status: outcome.status,
            error_message: outcome.error_message,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UploadBackgroundRequest {
    #[serde(default)]
    pub image_data: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UploadBackgroundResponse {
    pub image_url: String,
    pub status: AssetStatus,
    pub error_message: String,
}

impl From<UploadedAsset> for UploadBackgroundResponse {
    fn from(asset: UploadedAsset) -> Self {
        Self {
            image_url: asset.url,
            status: asset.status,
            error_message: asset.error_message.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GetStatusResponse {
    pub status: JobStatus,
    pub image_url: String,
    pub progress: u8,
    pub error_message: String,
}

impl From<GenerationJob> for GetStatusResponse {
    fn from(job: GenerationJob) -> Self {
        Self {
            status: job.status,
            image_url: job.result_url.unwrap_or_default(),
            progress: job.progress,
            error_message: job.error_message.unwrap_or_default(),
        }
    }
}

// --- Agent-protocol envelope payload ---

/// Parameter block shared by the MCP and A2A entry points. Both envelopes
/// carry the same fields; only the action/method key differs, so a single
/// builder maps them onto the internal request model.
#[derive(Debug, Deserialize, Clone)]
pub struct AgentParams {
    #[serde(default)]
    pub user_id: String,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default)]
    pub background_url: String,
}

impl Default for AgentParams {
    fn default() -> Self {
        Self { user_id: String::new(), style: default_style(), background_url: String::new() }
    }
}

impl From<AgentParams> for GenerationRequest {
    fn from(params: AgentParams) -> Self {
        GenerationRequest {
            user_id: params.user_id,
            style_preference: params.style,
            background_image_url: params.background_url,
            cart_items: Vec::new(),
        }
    }
}
