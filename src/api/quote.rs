//! Quote endpoints.
//!
//! Argument validation happens here and surfaces as 400s; business-level
//! quote failures (no route anywhere) come back as 200s with an
//! `{error: true}` body per the engine's contract.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::quoting::amounts::parse_atomic;
use crate::quoting::engine::QuoteParams;
use crate::quoting::tokens::{is_valid_sui_address, normalize_coin_type, resolve_coin_type};
use crate::quoting::QuoteResult;
use crate::types::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    /// Token symbol or full coin type
    pub from: String,
    pub to: String,
    /// Atomic amount as a decimal string
    pub amount: String,
    /// Sender address; part of the cache key
    pub requester: String,
    #[serde(default = "default_by_amount_in")]
    pub by_amount_in: bool,
}

fn default_by_amount_in() -> bool {
    true
}

/// POST /api/quote - Reconciled quote across the aggregator and direct pool
pub async fn get_quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> ApiResult<Json<QuoteResult>> {
    let network = state.engine.network();

    let from_type = resolve_coin_type(network, &request.from)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown token: {}", request.from)))?;
    let to_type = resolve_coin_type(network, &request.to)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown token: {}", request.to)))?;
    if normalize_coin_type(&from_type) == normalize_coin_type(&to_type) {
        return Err(ApiError::BadRequest(
            "From and to tokens must differ".to_string(),
        ));
    }

    let amount = parse_atomic(&request.amount)
        .map_err(|e| ApiError::BadRequest(format!("Invalid amount: {e}")))?;
    if amount.is_zero() {
        return Err(ApiError::BadRequest("Amount must be positive".to_string()));
    }

    if !is_valid_sui_address(&request.requester) {
        return Err(ApiError::BadRequest(format!(
            "Invalid requester address: {}",
            request.requester
        )));
    }

    let params = QuoteParams {
        from_type,
        to_type,
        amount,
        requester: request.requester,
        by_amount_in: request.by_amount_in,
    };

    tracing::info!(
        from = %params.from_type,
        to = %params.to_type,
        amount = %params.amount,
        by_amount_in = params.by_amount_in,
        "quote requested"
    );

    Ok(Json(state.engine.quote(&params).await))
}

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub cleared: bool,
}

/// POST /api/quote/cache/clear - Drop all cached quotes
pub async fn clear_cache(State(state): State<AppState>) -> Json<ClearCacheResponse> {
    state.engine.clear_cache().await;
    tracing::info!("quote cache cleared");
    Json(ClearCacheResponse { cleared: true })
}
