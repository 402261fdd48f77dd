//! Generation orchestration pipeline.
//!
//! One job runs strictly sequentially: resolve cart items, enrich against
//! the catalog (partial failure tolerated), build the prompt, invoke the
//! generative backend, finalize. Every external hop degrades instead of
//! failing the job; the only user-visible failure is a cart with no items.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::clients::{CartService, ProductCatalog};
use crate::generator::{select_placeholder, ImageModelClient};
use crate::models::{
    AssetStatus, CartItem, GenerationOutcome, GenerationJob, GenerationRequest, JobStatus,
    ProductDetail, UploadedAsset,
};
use crate::status::StatusStore;
use crate::storage::AssetStore;

/// Job-level failure message for a cart that resolves to nothing.
pub const NO_ITEMS_ERROR: &str = "No items found in cart";

#[derive(Debug, Error)]
pub enum GenerateError {
    /// Domain rejection: nothing to render and nobody to look up. No job is
    /// created.
    #[error("request must include cart items or a user id")]
    EmptyRequest,
    /// An error escaped the pipeline; the job has been marked failed.
    #[error("{message}")]
    Pipeline { generation_id: Uuid, message: String },
}

pub struct Orchestrator {
    cart: Arc<dyn CartService>,
    catalog: Arc<dyn ProductCatalog>,
    model: Option<ImageModelClient>,
    assets: AssetStore,
    status: Arc<StatusStore>,
    rng: Mutex<StdRng>,
}

impl Orchestrator {
    pub fn new(
        cart: Arc<dyn CartService>,
        catalog: Arc<dyn ProductCatalog>,
        model: Option<ImageModelClient>,
        assets: AssetStore,
        status: Arc<StatusStore>,
        rng: StdRng,
    ) -> Self {
        Self { cart, catalog, model, assets, status, rng: Mutex::new(rng) }
    }

    /// Run the full pipeline for one request.
    ///
    /// `Ok` carries the job's terminal outcome, including the expected
    /// "no items found" failure. `Err` is either the domain rejection (no
    /// job was created) or an unexpected pipeline error (the job exists and
    /// has been marked failed).
    pub async fn generate(&self, req: GenerationRequest) -> Result<GenerationOutcome, GenerateError> {
        if req.cart_items.is_empty() && req.user_id.trim().is_empty() {
            return Err(GenerateError::EmptyRequest);
        }

        let id = self.status.create(&req.user_id);
        info!(generation_id = %id, user_id = %req.user_id, "starting cart image generation");

        match self.run(id, &req).await {
            Ok(Some(url)) => {
                self.status.complete(id, url.clone());
                info!(generation_id = %id, image_url = %url, "✅ cart image ready");
                Ok(GenerationOutcome {
                    generation_id: id,
                    status: JobStatus::Completed,
                    image_url: url,
                    error_message: String::new(),
                })
            }
            Ok(None) => {
                warn!(generation_id = %id, user_id = %req.user_id, "no cart items to render");
                self.status.fail(id, NO_ITEMS_ERROR);
                Ok(GenerationOutcome {
                    generation_id: id,
                    status: JobStatus::Failed,
                    image_url: String::new(),
                    error_message: NO_ITEMS_ERROR.to_string(),
                })
            }
            Err(err) => {
                let message = err.to_string();
                error!(generation_id = %id, error = %message, "generation pipeline failed");
                self.status.fail(id, message.clone());
                Err(GenerateError::Pipeline { generation_id: id, message })
            }
        }
    }

    /// The pipeline body. `Ok(None)` means the cart resolved to nothing;
    /// anything escaping as `Err` is caught at the [`generate`] boundary and
    /// recorded on the job instead of crashing the transport.
    ///
    /// [`generate`]: Orchestrator::generate
    async fn run(&self, id: Uuid, req: &GenerationRequest) -> anyhow::Result<Option<String>> {
        let items = self.resolve_items(req).await;
        if items.is_empty() {
            return Ok(None);
        }

        let details = self.enrich(&items).await;
        self.status.set_progress(id, 25);

        let prompt = build_prompt(&details, &req.style_preference, &req.background_image_url);
        self.status.set_progress(id, 50);

        let url = self.render(id, &req.style_preference, &prompt).await;
        self.status.set_progress(id, 100);

        Ok(Some(url))
    }

    /// An explicit item list wins; otherwise the cart service is consulted.
    /// A cart lookup failure degrades to an empty cart.
    async fn resolve_items(&self, req: &GenerationRequest) -> Vec<CartItem> {
        if !req.cart_items.is_empty() {
            return req.cart_items.clone();
        }
        match self.cart.get_cart(&req.user_id).await {
            Ok(items) => items,
            Err(err) => {
                error!(user_id = %req.user_id, error = %err, "cart lookup failed");
                Vec::new()
            }
        }
    }

    /// Enrich each item against the catalog. Individual lookup failures drop
    /// the item; if every lookup fails, the raw item ids stand in so the job
    /// can still render something.
    async fn enrich(&self, items: &[CartItem]) -> Vec<ProductDetail> {
        let mut details = Vec::with_capacity(items.len());
        for item in items {
            match self.catalog.get_product(&item.product_id).await {
                Ok(product) => details.push(ProductDetail {
                    id: product.id,
                    name: product.name,
                    description: product.description,
                    picture: product.picture,
                    quantity: item.quantity,
                }),
                Err(err) => {
                    error!(product_id = %item.product_id, error = %err, "product lookup failed, dropping item");
                }
            }
        }
        if details.is_empty() {
            warn!("no products enriched, rendering from raw cart item ids");
            return items
                .iter()
                .map(|item| ProductDetail {
                    id: item.product_id.clone(),
                    name: item.product_id.clone(),
                    description: String::new(),
                    picture: String::new(),
                    quantity: item.quantity,
                })
                .collect();
        }
        details
    }

    /// Invoke the backend and persist the rendered asset. Any failure along
    /// the way falls back to a placeholder; this step never fails the job.
    async fn render(&self, id: Uuid, style: &str, prompt: &str) -> String {
        if let Some(model) = &self.model {
            match model.generate(prompt).await {
                Ok(bytes) => {
                    let asset: UploadedAsset = self.assets.upload(&bytes).await;
                    match asset.status {
                        AssetStatus::Success => return asset.url,
                        AssetStatus::Failed => warn!(
                            generation_id = %id,
                            error = ?asset.error_message,
                            "🔄 rendered asset could not be stored, using placeholder"
                        ),
                    }
                }
                Err(err) => {
                    warn!(generation_id = %id, error = %err, "🔄 image model call failed, using placeholder");
                }
            }
        } else {
            info!(generation_id = %id, "image model unavailable, using placeholder");
        }
        let mut rng = self.rng.lock();
        select_placeholder(style, &id, &mut *rng)
    }

    /// Decode and store a caller-provided background image. Errors are folded
    /// into the returned asset; this boundary never raises.
    pub async fn upload_background(&self, image_data: &str) -> UploadedAsset {
        use base64::Engine;
        let bytes = match base64::engine::general_purpose::STANDARD.decode(image_data.as_bytes()) {
            Ok(bytes) => bytes,
            Err(err) => return UploadedAsset::failed(format!("invalid base64 image data: {err}")),
        };
        self.assets.upload(&bytes).await
    }

    /// Read-only status lookup for the façades.
    pub fn job_status(&self, generation_id: &str) -> GenerationJob {
        self.status.get(generation_id)
    }
}

// --- Prompt construction (pure, never fails) ---

/// Map a style keyword onto its prompt modifier. Unrecognized styles get the
/// modern treatment.
pub fn style_modifier(style: &str) -> &'static str {
    match style.to_lowercase().as_str() {
        "vintage" => "Vintage-inspired styling with classic, timeless appeal and warm, nostalgic tones",
        "minimalist" => "Ultra-clean, minimalist composition with focus on simplicity and negative space",
        "luxury" => "High-end, luxurious presentation with premium materials and sophisticated styling",
        "casual" => "Relaxed, casual styling with comfortable, everyday appeal",
        "professional" => "Professional, business-appropriate styling suitable for corporate environments",
        _ => "Modern, clean, minimalist aesthetic with contemporary styling and sleek presentation",
    }
}

fn describe_products(details: &[ProductDetail]) -> String {
    let mut out = String::new();
    for detail in details {
        let description = if detail.description.is_empty() {
            "No description"
        } else {
            detail.description.as_str()
        };
        out.push_str(&format!("- {} ({}x): {}\n", detail.name, detail.quantity, description));
    }
    out
}

pub fn build_prompt(details: &[ProductDetail], style: &str, background_url: &str) -> String {
    let background = if background_url.is_empty() {
        "Use a clean, appropriate background that highlights the products."
    } else {
        "Use the provided background image as context."
    };
    format!(
        "Generate a realistic product image showing the following items in a {style} style:\n\
         {products}\n\
         Style instructions: {modifier}\n\n\
         Background: {background}\n\n\
         Make it look like professional product photography with good lighting and composition.",
        style = style,
        products = describe_products(details),
        modifier = style_modifier(style),
        background = background,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{ClientError, StubCartClient, StubProductClient};
    use crate::models::Product;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCart {
        items: Vec<CartItem>,
        calls: AtomicUsize,
    }

    impl CountingCart {
        fn new(items: Vec<CartItem>) -> Arc<Self> {
            Arc::new(Self { items, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl CartService for CountingCart {
        async fn get_cart(&self, _user_id: &str) -> Result<Vec<CartItem>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.items.clone())
        }
    }

    struct FlakyCatalog {
        failing: HashSet<String>,
    }

    #[async_trait]
    impl ProductCatalog for FlakyCatalog {
        async fn get_product(&self, product_id: &str) -> Result<Product, ClientError> {
            if self.failing.contains(product_id) {
                return Err(ClientError::Http("catalog is down for this product".into()));
            }
            StubProductClient.get_product(product_id).await
        }
    }

    fn item(product_id: &str, quantity: u32) -> CartItem {
        CartItem { product_id: product_id.to_string(), quantity }
    }

    fn orchestrator_with(
        cart: Arc<dyn CartService>,
        catalog: Arc<dyn ProductCatalog>,
    ) -> (Orchestrator, Arc<StatusStore>) {
        let status = Arc::new(StatusStore::new());
        let assets = AssetStore::offline("online-boutique-images", reqwest::Client::new());
        let orchestrator = Orchestrator::new(
            cart,
            catalog,
            None,
            assets,
            status.clone(),
            StdRng::seed_from_u64(7),
        );
        (orchestrator, status)
    }

    #[tokio::test]
    async fn explicit_items_complete_without_a_cart_lookup() {
        let cart = CountingCart::new(vec![item("should-not-be-used", 1)]);
        let (orchestrator, status) = orchestrator_with(cart.clone(), Arc::new(StubProductClient));

        let outcome = orchestrator
            .generate(GenerationRequest {
                user_id: "u1".into(),
                cart_items: vec![item("p1", 2), item("p2", 1)],
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.status, JobStatus::Completed);
        assert!(!outcome.image_url.is_empty());
        assert_eq!(cart.calls.load(Ordering::SeqCst), 0);

        let job = status.get(&outcome.generation_id.to_string());
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.result_url.as_deref(), Some(outcome.image_url.as_str()));
    }

    #[tokio::test]
    async fn unresolvable_user_fails_with_no_items() {
        let (orchestrator, status) =
            orchestrator_with(Arc::new(StubCartClient), Arc::new(StubProductClient));

        let outcome = orchestrator
            .generate(GenerationRequest { user_id: "u1".into(), ..Default::default() })
            .await
            .unwrap();

        assert_eq!(outcome.status, JobStatus::Failed);
        assert_eq!(outcome.error_message, NO_ITEMS_ERROR);
        assert!(outcome.image_url.is_empty());

        let job = status.get(&outcome.generation_id.to_string());
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some(NO_ITEMS_ERROR));
    }

    #[tokio::test]
    async fn empty_request_is_rejected_without_creating_a_job() {
        let (orchestrator, status) =
            orchestrator_with(Arc::new(StubCartClient), Arc::new(StubProductClient));

        let err = orchestrator.generate(GenerationRequest::default()).await.unwrap_err();
        assert!(matches!(err, GenerateError::EmptyRequest));
        // Nothing was written: an arbitrary lookup still synthesizes not_found.
        let probe = status.get(&Uuid::new_v4().to_string());
        assert_eq!(probe.status, JobStatus::NotFound);
    }

    #[tokio::test]
    async fn cart_lookup_resolves_items_when_none_are_explicit() {
        let cart = CountingCart::new(vec![item("p9", 3)]);
        let (orchestrator, _status) = orchestrator_with(cart.clone(), Arc::new(StubProductClient));

        let outcome = orchestrator
            .generate(GenerationRequest { user_id: "u2".into(), ..Default::default() })
            .await
            .unwrap();

        assert_eq!(outcome.status, JobStatus::Completed);
        assert_eq!(cart.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_failed_lookup_does_not_fail_the_job() {
        let catalog = Arc::new(FlakyCatalog { failing: HashSet::from(["p2".to_string()]) });
        let (orchestrator, status) = orchestrator_with(Arc::new(StubCartClient), catalog);

        let outcome = orchestrator
            .generate(GenerationRequest {
                cart_items: vec![item("p1", 1), item("p2", 1), item("p3", 1)],
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.status, JobStatus::Completed);
        assert_eq!(status.get(&outcome.generation_id.to_string()).progress, 100);
    }

    #[tokio::test]
    async fn enrichment_drops_exactly_the_failing_items() {
        let catalog = Arc::new(FlakyCatalog { failing: HashSet::from(["p2".to_string()]) });
        let (orchestrator, _status) = orchestrator_with(Arc::new(StubCartClient), catalog);

        let details = orchestrator
            .enrich(&[item("p1", 1), item("p2", 5), item("p3", 2)])
            .await;

        let names: Vec<&str> = details.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Product p1", "Product p3"]);
        assert_eq!(details[1].quantity, 2);
    }

    #[tokio::test]
    async fn total_enrichment_failure_falls_back_to_raw_ids() {
        let catalog = Arc::new(FlakyCatalog {
            failing: HashSet::from(["p1".to_string(), "p2".to_string()]),
        });
        let (orchestrator, _status) = orchestrator_with(Arc::new(StubCartClient), catalog);

        let details = orchestrator.enrich(&[item("p1", 1), item("p2", 4)]).await;
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].name, "p1");
        assert_eq!(details[1].quantity, 4);
        assert!(details[0].description.is_empty());
    }

    #[test]
    fn style_modifiers_cover_the_known_set_and_default() {
        assert!(style_modifier("vintage").contains("nostalgic"));
        assert!(style_modifier("LUXURY").contains("premium"));
        assert!(style_modifier("professional").contains("corporate"));
        // Unrecognized styles read as modern.
        assert_eq!(style_modifier("steampunk"), style_modifier("modern"));
    }

    #[test]
    fn prompt_lists_products_with_quantities() {
        let details = vec![
            ProductDetail {
                id: "p1".into(),
                name: "Sunglasses".into(),
                description: "UV-blocking shades".into(),
                picture: "/static/img/products/p1.jpg".into(),
                quantity: 2,
            },
            ProductDetail {
                id: "p2".into(),
                name: "p2".into(),
                description: String::new(),
                picture: String::new(),
                quantity: 1,
            },
        ];
        let prompt = build_prompt(&details, "vintage", "");
        assert!(prompt.contains("- Sunglasses (2x): UV-blocking shades"));
        assert!(prompt.contains("- p2 (1x): No description"));
        assert!(prompt.contains("vintage style"));
        assert!(prompt.contains(style_modifier("vintage")));
        assert!(prompt.contains("clean, appropriate background"));
    }

    #[test]
    fn prompt_references_a_provided_background() {
        let prompt = build_prompt(&[], "modern", "https://example.com/bg.jpg");
        assert!(prompt.contains("Use the provided background image as context."));
    }
}
