use std::time::Duration;

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Service configuration, loaded once from the environment.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bind port for the binary RPC listener (`PORT`).
    pub rpc_port: u16,
    /// Bind port for the HTTP/JSON façade (`HTTP_PORT`).
    pub http_port: u16,
    /// Sibling cart service address (`CART_SERVICE_ADDR`).
    pub cart_service_addr: String,
    /// Sibling product catalog address (`PRODUCT_CATALOG_SERVICE_ADDR`).
    pub product_catalog_addr: String,
    /// Object storage bucket for uploaded assets (`GCS_BUCKET`).
    pub gcs_bucket: String,
    /// Project scoping the managed secret store (`PROJECT_ID`).
    pub project_id: String,
    /// Static fallback API key (`GEMINI_API_KEY`), used when the secret
    /// store cannot be reached.
    pub gemini_api_key: Option<String>,
    /// Base URL of the generative backend (`GEMINI_API_BASE`).
    pub gemini_api_base: String,
    /// Per-call timeout applied to every outbound HTTP request
    /// (`UPSTREAM_TIMEOUT_SECS`).
    pub upstream_timeout: Duration,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self {
            rpc_port: env_parse("PORT", 9100),
            http_port: env_parse("HTTP_PORT", 9101),
            cart_service_addr: env_or("CART_SERVICE_ADDR", "cartservice:7070"),
            product_catalog_addr: env_or("PRODUCT_CATALOG_SERVICE_ADDR", "productcatalogservice:3550"),
            gcs_bucket: env_or("GCS_BUCKET", "online-boutique-images"),
            project_id: env_or("PROJECT_ID", "your-project-id"),
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            gemini_api_base: env_or("GEMINI_API_BASE", "https://generativelanguage.googleapis.com/v1beta"),
            upstream_timeout: Duration::from_secs(env_parse("UPSTREAM_TIMEOUT_SECS", 10)),
        }
    }
}
