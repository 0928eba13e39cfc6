//! Market data endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::api::AppState;
use crate::market::{SpotError, SpotPrice};
use crate::types::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct SpotQuery {
    pub symbol: String,
}

/// GET /api/market/spot?symbol=SUI - USD spot price, possibly stale-flagged
pub async fn get_spot(
    State(state): State<AppState>,
    Query(query): Query<SpotQuery>,
) -> ApiResult<Json<SpotPrice>> {
    match state.spot.spot(&query.symbol).await {
        Ok(price) => Ok(Json(price)),
        Err(e @ SpotError::UnknownSymbol(_)) => Err(ApiError::BadRequest(e.to_string())),
        Err(e @ SpotError::Unavailable(_)) => Err(ApiError::Upstream(e.to_string())),
    }
}
