//! Token and pool listing endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::AppState;
use crate::quoting::pool::{known_pools, KnownPool};
use crate::quoting::tokens::{self, Network};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenEntry {
    pub symbol: String,
    pub coin_type: String,
    pub decimals: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensResponse {
    pub network: Network,
    pub tokens: Vec<TokenEntry>,
}

/// GET /api/tokens - Registered tokens for the active network
pub async fn list_tokens(State(state): State<AppState>) -> Json<TokensResponse> {
    let network = state.engine.network();
    let tokens = tokens::tokens(network)
        .iter()
        .map(|t| TokenEntry {
            symbol: t.symbol.to_string(),
            coin_type: t.coin_type.to_string(),
            decimals: t.decimals,
        })
        .collect();
    Json(TokensResponse { network, tokens })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolsResponse {
    pub network: Network,
    pub pools: Vec<KnownPool>,
}

/// GET /api/pools - Statically configured direct pools
pub async fn list_pools(State(state): State<AppState>) -> Json<PoolsResponse> {
    let network = state.engine.network();
    Json(PoolsResponse {
        network,
        pools: known_pools(network),
    })
}
