//! Swap Router Backend
//!
//! HTTP API server for Sui swap quotes: queries the Cetus aggregator and a
//! direct CLMM pool concurrently, reconciles them into one unified quote,
//! and builds signable transaction plans.

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swap_router_backend::api;
use swap_router_backend::market::SpotClient;
use swap_router_backend::plan::PlanConfig;
use swap_router_backend::quoting::aggregator::AggregatorClient;
use swap_router_backend::quoting::cache::QuoteCache;
use swap_router_backend::quoting::pool::DirectPoolClient;
use swap_router_backend::quoting::tokens::Network;
use swap_router_backend::quoting::QuoteEngine;

const DEFAULT_SWAP_PACKAGE_ID: &str = "0x0";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let network = Network::from_env();
    tracing::info!(network = network.as_str(), "starting swap router backend");

    let plan_config = PlanConfig::from_env(DEFAULT_SWAP_PACKAGE_ID);
    if plan_config.partner_id.is_some() {
        tracing::info!("partner referral configured");
    }

    let aggregator = Arc::new(AggregatorClient::from_env());
    let direct = Arc::new(DirectPoolClient::from_env(network));
    let cache = QuoteCache::from_env();
    let engine = Arc::new(QuoteEngine::new(
        network,
        aggregator,
        direct,
        cache,
        plan_config.swap_package_id.clone(),
    ));
    let spot = Arc::new(SpotClient::from_env());

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api::router(engine, plan_config, spot))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3001));
    tracing::info!("Starting server on {}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  GET  /health                 - Health check");
    tracing::info!("  POST /api/quote              - Reconciled swap quote");
    tracing::info!("  POST /api/quote/cache/clear  - Clear the quote cache");
    tracing::info!("  POST /api/plan               - Build a transaction plan");
    tracing::info!("  GET  /api/tokens             - List registered tokens");
    tracing::info!("  GET  /api/pools              - List known direct pools");
    tracing::info!("  GET  /api/market/spot        - USD spot price (?symbol=)");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}
