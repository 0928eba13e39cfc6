//! Transaction plan endpoint.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::api::AppState;
use crate::plan::{self, PlanError, PlanOptions, TransactionPlan, DEFAULT_SLIPPAGE_BPS};
use crate::quoting::tokens::is_valid_sui_address;
use crate::quoting::Quote;
use crate::types::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    /// A quote previously returned by `/api/quote`
    pub quote: Quote,
    pub sender: String,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u64,
    /// Alternate candidate route id to execute
    #[serde(default)]
    pub route_id: Option<usize>,
    /// Zap mode: deliver the output here instead of the sender
    #[serde(default)]
    pub zap_recipient: Option<String>,
}

fn default_slippage_bps() -> u64 {
    DEFAULT_SLIPPAGE_BPS
}

/// POST /api/plan - Signable operation list for a quote
pub async fn create_plan(
    State(state): State<AppState>,
    Json(request): Json<PlanRequest>,
) -> ApiResult<Json<TransactionPlan>> {
    if !is_valid_sui_address(&request.sender) {
        return Err(ApiError::BadRequest(format!(
            "Invalid sender address: {}",
            request.sender
        )));
    }

    let options = PlanOptions {
        sender: request.sender,
        slippage_bps: request.slippage_bps,
        route_id: request.route_id,
        zap_recipient: request.zap_recipient,
    };

    let plan = plan::build_plan(&state.plan_config, &request.quote, &options).map_err(|e| {
        match e {
            PlanError::NotExecutable(_)
            | PlanError::InvalidSlippage(_)
            | PlanError::InvalidRecipient(_) => ApiError::BadRequest(e.to_string()),
        }
    })?;

    tracing::info!(
        sender = %plan.sender,
        ops = plan.ops.len(),
        slippage_bps = plan.slippage_bps,
        "transaction plan built"
    );

    Ok(Json(plan))
}
