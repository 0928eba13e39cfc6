//! API endpoints for the swap routing service

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

mod market;
mod plan;
mod quote;
mod registry;

use crate::market::SpotClient;
use crate::plan::PlanConfig;
use crate::quoting::QuoteEngine;

/// Shared application state: the quote engine, plan configuration and the
/// spot price client
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QuoteEngine>,
    pub plan_config: Arc<PlanConfig>,
    pub spot: Arc<SpotClient>,
}

impl AppState {
    pub fn new(engine: Arc<QuoteEngine>, plan_config: PlanConfig, spot: Arc<SpotClient>) -> Self {
        Self {
            engine,
            plan_config: Arc::new(plan_config),
            spot,
        }
    }
}

/// Create the API router with all endpoints
pub fn router(engine: Arc<QuoteEngine>, plan_config: PlanConfig, spot: Arc<SpotClient>) -> Router {
    let app_state = AppState::new(engine, plan_config, spot);

    Router::new()
        // Quoting
        .route("/quote", post(quote::get_quote))
        .route("/quote/cache/clear", post(quote::clear_cache))
        // Transaction plan
        .route("/plan", post(plan::create_plan))
        // Registry listings
        .route("/tokens", get(registry::list_tokens))
        .route("/pools", get(registry::list_pools))
        // Market data (supports ?symbol=SUI|USDC|CETUS|wUSDC)
        .route("/market/spot", get(market::get_spot))
        .with_state(app_state)
}
