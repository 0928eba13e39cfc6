//! Unified quote model.
//!
//! Every quote returned to callers has the same shape regardless of which
//! route source produced it. The plan builder switches only on structural
//! shape, never on provenance; `meta.is_synthetic` exists for observability
//! and is not policy-bearing. Quotes are immutable once built — selecting an
//! alternate route derives a new value.

use std::collections::BTreeMap;

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::quoting::amounts::serde_atomic;

/// Which source a quote reports. After reconciliation every successful quote
/// reports `Aggregator`, even when internally produced by the direct-pool
/// fallback; `Error` marks the both-sources-failed terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuoteSource {
    Aggregator,
    DirectPool,
    Error,
}

/// One hop of a route, for display and partner gating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStep {
    pub from: String,
    pub to: String,
    pub from_symbol: String,
    pub to_symbol: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_rate: Option<f64>,
}

/// Pool details attached to a router path. Required by the execution layer
/// for single-pool paths; synthesized paths always carry them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedDetails {
    pub pool_address: String,
    pub coin_type_a: String,
    pub coin_type_b: String,
}

/// One path inside the router payload, in the aggregator's own schema.
/// The synthetic fallback path populates every field a real one carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterPath {
    pub id: String,
    pub provider: String,
    pub from: String,
    pub target: String,
    #[serde(default)]
    pub fee_rate: f64,
    #[serde(with = "serde_atomic")]
    pub amount_in: U256,
    #[serde(with = "serde_atomic")]
    pub amount_out: U256,
    /// a2b flag for single-pool paths
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_details: Option<ExtendedDetails>,
}

/// The router payload the plan builder consumes. Identical shape whether it
/// came from the aggregator service or was synthesized from a direct pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterData {
    pub quote_id: String,
    #[serde(with = "serde_atomic")]
    pub amount_in: U256,
    #[serde(with = "serde_atomic")]
    pub amount_out: U256,
    pub by_amount_in: bool,
    pub paths: Vec<RouterPath>,
    #[serde(default)]
    pub insufficient_liquidity: bool,
    /// Router package registry, e.g. the `aggregator_v3` package id
    #[serde(default)]
    pub packages: BTreeMap<String, String>,
}

/// One candidate route offered for user-facing route selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePath {
    pub id: usize,
    pub label: String,
    #[serde(with = "serde_atomic")]
    pub amount_in: U256,
    #[serde(with = "serde_atomic")]
    pub amount_out: U256,
    pub steps: Vec<RouteStep>,
    pub hop_count: usize,
    /// Underlying router-schema path, so a selected route can be replayed
    /// through the plan builder on its own.
    pub router_path: RouterPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteKind {
    Aggregator,
    DirectPool,
}

/// Display summary of the selected route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDetails {
    pub kind: RouteKind,
    pub hops: usize,
    pub providers: Vec<String>,
    pub steps: Vec<RouteStep>,
    pub path_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Better {
    Aggregator,
    DirectPool,
    Equal,
}

/// Aggregator-vs-direct-pool price comparison. Present only when both
/// sources returned a usable amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    #[serde(with = "serde_atomic")]
    pub direct_out: U256,
    #[serde(with = "serde_atomic")]
    pub aggregator_out: U256,
    #[serde(with = "serde_atomic")]
    pub savings_abs: U256,
    /// Display-only percentage; the comparative magnitude is computed with
    /// integer numerator scaling before this is derived.
    pub savings_pct: f64,
    pub better: Better,
}

/// Cache diagnostics attached to served quotes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub hit: bool,
    pub age_ms: u64,
    pub ttl_ms: u64,
}

/// Diagnostic metadata: per-source latencies, fallback provenance, cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregator_latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_from: Option<QuoteSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheInfo>,
    #[serde(default)]
    pub is_synthetic: bool,
}

/// The unified quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub source: QuoteSource,
    #[serde(with = "serde_atomic")]
    pub amount_in: U256,
    #[serde(with = "serde_atomic")]
    pub amount_out: U256,
    pub by_amount_in: bool,
    #[serde(with = "serde_atomic")]
    pub estimated_fee: U256,
    /// Full router payload for the plan builder
    pub router: RouterData,
    /// Full candidate set for alternate-route selection, best price first
    pub paths: Vec<RoutePath>,
    pub selected_route_id: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub a2b: Option<bool>,
    pub route_details: RouteDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison>,
    pub meta: QuoteMeta,
}

impl Quote {
    /// Derive a new quote with an alternate candidate route selected.
    /// Unknown ids fall back to the current selection; the original quote is
    /// never mutated.
    pub fn with_selected_route(&self, route_id: usize) -> Quote {
        let mut derived = self.clone();
        if self.source != QuoteSource::Aggregator {
            return derived;
        }
        let Some(path) = self.paths.iter().find(|p| p.id == route_id) else {
            return derived;
        };
        derived.selected_route_id = path.id;
        derived.amount_in = path.amount_in;
        derived.amount_out = path.amount_out;
        derived
    }

    /// The router-schema path of the currently selected route, when the
    /// candidate set carries it.
    pub fn selected_router_path(&self) -> Option<&RouterPath> {
        self.paths
            .iter()
            .find(|p| p.id == self.selected_route_id)
            .map(|p| &p.router_path)
    }
}

/// Terminal error payload: both sources failed. Returned as a value, never
/// an exception; callers check `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorQuote {
    pub error: bool,
    pub error_message: String,
    pub source: QuoteSource,
    pub meta: QuoteMeta,
}

/// Outcome of a reconciliation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuoteResult {
    Quote(Box<Quote>),
    Error(ErrorQuote),
}

impl QuoteResult {
    pub fn is_error(&self) -> bool {
        matches!(self, QuoteResult::Error(_))
    }

    pub fn as_quote(&self) -> Option<&Quote> {
        match self {
            QuoteResult::Quote(q) => Some(q),
            QuoteResult::Error(_) => None,
        }
    }

    pub fn meta_mut(&mut self) -> &mut QuoteMeta {
        match self {
            QuoteResult::Quote(q) => &mut q.meta,
            QuoteResult::Error(e) => &mut e.meta,
        }
    }
}
