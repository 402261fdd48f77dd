//! Client for the generative image backend, plus placeholder selection.
//!
//! The backend is a pluggable black box: it either returns rendered image
//! bytes or an error. Callers are expected to absorb errors by substituting
//! a placeholder asset, so a broken or unconfigured backend never fails a
//! job.

use base64::Engine;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

const IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("http error: {0}")]
    Http(String),
    #[error("malformed response: {0}")]
    Response(String),
    #[error("no image data in response")]
    NoImage,
}

pub struct ImageModelClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ImageModelClient {
    pub fn new(client: reqwest::Client, api_key: String, base_url: String) -> Self {
        Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string() }
    }

    /// Render one image for the prompt and return its raw bytes.
    pub async fn generate(&self, prompt: &str) -> Result<Vec<u8>, ModelError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, IMAGE_MODEL, self.api_key
        );
        let request_body = json!({
            "contents": [{
                "parts": [{"text": prompt}]
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "temperature": 0.4,
                "topP": 0.95,
                "topK": 64,
                "candidateCount": 1
            }
        });

        let response = self
            .client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| ModelError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Http(format!("status={status} body={body}")));
        }

        let body = response.text().await.map_err(|e| ModelError::Http(e.to_string()))?;
        decode_image_response(&body)
    }
}

// --- Response parsing helpers ---

#[derive(Debug, Deserialize)]
struct ModelResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        #[allow(dead_code)]
        text: String,
    },
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

fn decode_image_response(body: &str) -> Result<Vec<u8>, ModelError> {
    let parsed: ModelResponse =
        serde_json::from_str(body).map_err(|e| ModelError::Response(e.to_string()))?;
    for candidate in &parsed.candidates {
        for part in &candidate.content.parts {
            if let Part::Inline { inline_data } = part {
                info!(mime_type = %inline_data.mime_type, "image payload found in model response");
                return base64::engine::general_purpose::STANDARD
                    .decode(inline_data.data.as_bytes())
                    .map_err(|e| ModelError::Response(format!("inline data is not base64: {e}")));
            }
        }
    }
    Err(ModelError::NoImage)
}

// --- Placeholder selection ---

/// Candidate substitute images used when the backend is unavailable or
/// fails. Recognized styles contribute one extra style-matched candidate.
pub fn placeholder_pool(style: &str, generation_id: &Uuid) -> Vec<String> {
    let id_str = generation_id.to_string();
    let short = &id_str[..6];
    let mut pool = vec![
        "https://picsum.photos/600/400?random=1".to_string(),
        "https://picsum.photos/600/400?random=2".to_string(),
        "https://picsum.photos/600/400?random=3".to_string(),
        "https://source.unsplash.com/600x400/?product".to_string(),
        "https://source.unsplash.com/600x400/?retail".to_string(),
        format!("https://placehold.co/600x400/random/white?text=Cart+Image+{short}"),
    ];
    let style = style.to_lowercase();
    if matches!(style.as_str(), "vintage" | "modern" | "minimalist" | "luxury") {
        pool.push(format!("https://source.unsplash.com/600x400/?{style}"));
    }
    pool
}

/// Uniform choice over the candidate pool. The random source is injected so
/// selection can be pinned in tests.
pub fn select_placeholder(style: &str, generation_id: &Uuid, rng: &mut impl Rng) -> String {
    let mut pool = placeholder_pool(style, generation_id);
    let idx = rng.gen_range(0..pool.len());
    pool.swap_remove(idx)
}
