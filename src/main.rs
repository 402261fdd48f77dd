use std::net::SocketAddr;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use cart_image_service::clients;
use cart_image_service::config::ServiceConfig;
use cart_image_service::generator::ImageModelClient;
use cart_image_service::orchestrator::Orchestrator;
use cart_image_service::routes::{self, AppState};
use cart_image_service::rpc;
use cart_image_service::secrets;
use cart_image_service::status::StatusStore;
use cart_image_service::storage::AssetStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let cfg = ServiceConfig::from_env();
    let http_client = reqwest::Client::builder().timeout(cfg.upstream_timeout).build()?;

    // One-time credential resolution; without a key the service runs in
    // placeholder mode for its whole lifetime.
    let model = match secrets::resolve_api_key(&cfg, &http_client).await {
        Some(key) => {
            info!("image model backend enabled");
            Some(ImageModelClient::new(http_client.clone(), key, cfg.gemini_api_base.clone()))
        }
        None => {
            warn!("no API key available, generation will use placeholder assets");
            None
        }
    };

    let cart = clients::connect_cart(&cfg.cart_service_addr, &http_client).await;
    let catalog = clients::connect_catalog(&cfg.product_catalog_addr, &http_client).await;
    let assets = AssetStore::connect(cfg.gcs_bucket.clone(), http_client.clone()).await;
    let status = Arc::new(StatusStore::new());

    let orchestrator = Arc::new(Orchestrator::new(
        cart,
        catalog,
        model,
        assets,
        status,
        StdRng::from_entropy(),
    ));

    let rpc_addr = SocketAddr::from(([0, 0, 0, 0], cfg.rpc_port));
    let rpc_listener = TcpListener::bind(rpc_addr).await?;
    info!(%rpc_addr, "starting RPC listener");
    tokio::spawn(rpc::serve(rpc_listener, orchestrator.clone()));

    let app = routes::router(AppState { orchestrator });
    let http_addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port));
    info!(%http_addr, "starting HTTP server");
    axum::serve(TcpListener::bind(http_addr).await?, app).await?;

    Ok(())
}
