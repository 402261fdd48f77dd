//! Clients for the sibling cart and product-catalog services.
//!
//! Each dependency is a trait with a live HTTP implementation and a stub
//! that synthesizes deterministic placeholder data. Selection happens once
//! at startup: if the sibling cannot be reached, the stub is substituted and
//! the orchestrator never learns the difference. Per-call failures on a live
//! client are left to the orchestrator's call sites.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{CartItem, Product};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(String),
    #[error("unexpected payload: {0}")]
    Payload(String),
}

#[async_trait]
pub trait CartService: Send + Sync {
    async fn get_cart(&self, user_id: &str) -> Result<Vec<CartItem>, ClientError>;
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn get_product(&self, product_id: &str) -> Result<Product, ClientError>;
}

// --- Live HTTP implementations ---

pub struct HttpCartClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CartPayload {
    #[serde(default)]
    items: Vec<CartItem>,
}

#[async_trait]
impl CartService for HttpCartClient {
    async fn get_cart(&self, user_id: &str) -> Result<Vec<CartItem>, ClientError> {
        let url = format!("{}/carts/{}", self.base_url, user_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::Http(format!("{} returned {}", url, response.status())));
        }
        let payload: CartPayload = response
            .json()
            .await
            .map_err(|e| ClientError::Payload(e.to_string()))?;
        Ok(payload.items)
    }
}

pub struct HttpProductClient {
    client: reqwest::Client,
    base_url: String,
}

#[async_trait]
impl ProductCatalog for HttpProductClient {
    async fn get_product(&self, product_id: &str) -> Result<Product, ClientError> {
        let url = format!("{}/products/{}", self.base_url, product_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::Http(format!("{} returned {}", url, response.status())));
        }
        response.json().await.map_err(|e| ClientError::Payload(e.to_string()))
    }
}

// --- Stub implementations for local development ---

/// Cart stub: every user has an empty cart.
pub struct StubCartClient;

#[async_trait]
impl CartService for StubCartClient {
    async fn get_cart(&self, _user_id: &str) -> Result<Vec<CartItem>, ClientError> {
        Ok(Vec::new())
    }
}

/// Catalog stub: products are derived from the requested id.
pub struct StubProductClient;

#[async_trait]
impl ProductCatalog for StubProductClient {
    async fn get_product(&self, product_id: &str) -> Result<Product, ClientError> {
        Ok(Product {
            id: product_id.to_string(),
            name: format!("Product {product_id}"),
            description: format!("Description for product {product_id}"),
            picture: format!("/static/img/products/{product_id}.jpg"),
        })
    }
}

// --- Startup selection ---

/// Prefix a bare `host:port` sibling address with `http://`.
fn ensure_scheme(addr: &str) -> String {
    if addr.contains("://") {
        addr.trim_end_matches('/').to_string()
    } else {
        format!("http://{}", addr.trim_end_matches('/'))
    }
}

/// Any response at all counts as reachable; only transport-level failures
/// (refused, unroutable, timeout) push us onto the stub.
async fn probe(client: &reqwest::Client, base_url: &str) -> Result<(), String> {
    client
        .get(format!("{base_url}/healthz"))
        .send()
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
}

pub async fn connect_cart(addr: &str, client: &reqwest::Client) -> Arc<dyn CartService> {
    let base_url = ensure_scheme(addr);
    match probe(client, &base_url).await {
        Ok(()) => {
            info!(%base_url, "connected to cart service");
            Arc::new(HttpCartClient { client: client.clone(), base_url })
        }
        Err(err) => {
            warn!(%base_url, error = %err, "cart service unreachable, using stub client");
            Arc::new(StubCartClient)
        }
    }
}

pub async fn connect_catalog(addr: &str, client: &reqwest::Client) -> Arc<dyn ProductCatalog> {
    let base_url = ensure_scheme(addr);
    match probe(client, &base_url).await {
        Ok(()) => {
            info!(%base_url, "connected to product catalog");
            Arc::new(HttpProductClient { client: client.clone(), base_url })
        }
        Err(err) => {
            warn!(%base_url, error = %err, "product catalog unreachable, using stub client");
            Arc::new(StubProductClient)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bare_addresses_get_an_http_scheme() {
        assert_eq!(ensure_scheme("cartservice:7070"), "http://cartservice:7070");
        assert_eq!(ensure_scheme("https://catalog:3550/"), "https://catalog:3550");
    }

    #[tokio::test]
    async fn stub_cart_is_always_empty() {
        let items = StubCartClient.get_cart("any-user").await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn stub_catalog_derives_products_from_the_id() {
        let product = StubProductClient.get_product("OLJCESPC7Z").await.unwrap();
        assert_eq!(product.name, "Product OLJCESPC7Z");
        assert_eq!(product.description, "Description for product OLJCESPC7Z");
        assert_eq!(product.picture, "/static/img/products/OLJCESPC7Z.jpg");
    }
}
