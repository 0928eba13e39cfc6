//! Route Source A: the multi-hop aggregator router service.
//!
//! Thin HTTP adapter over the router v3 `find_routes` endpoint. Flattens the
//! service's path shapes (flat endpoints or nested hop lists) into
//! [`RouterPath`] records; endpoint validation and ordering belong to the
//! engine, not here.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use primitive_types::U256;
use serde::{Deserialize, Deserializer};

use crate::quoting::types::{RouterData, RouterPath};
use crate::quoting::SourceError;

pub const DEFAULT_AGGREGATOR_URL: &str = "https://api-sui.cetus.zone/router_v3";
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

#[async_trait]
pub trait AggregatorSource: Send + Sync {
    /// Find candidate routes for a pair and amount. Zero paths is a valid
    /// response; transport or decode failures are errors.
    async fn find_routes(
        &self,
        from: &str,
        target: &str,
        amount: U256,
        by_amount_in: bool,
    ) -> Result<RouterData, SourceError>;
}

pub struct AggregatorClient {
    http: reqwest::Client,
    endpoint: String,
    timeout_ms: u64,
}

impl AggregatorClient {
    pub fn new(endpoint: impl Into<String>, timeout_ms: u64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            http,
            endpoint: endpoint.into(),
            timeout_ms,
        }
    }

    pub fn from_env() -> Self {
        let endpoint =
            std::env::var("AGGREGATOR_URL").unwrap_or_else(|_| DEFAULT_AGGREGATOR_URL.to_string());
        let timeout_ms = std::env::var("AGGREGATOR_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        Self::new(endpoint, timeout_ms)
    }
}

#[async_trait]
impl AggregatorSource for AggregatorClient {
    async fn find_routes(
        &self,
        from: &str,
        target: &str,
        amount: U256,
        by_amount_in: bool,
    ) -> Result<RouterData, SourceError> {
        let url = format!("{}/find_routes", self.endpoint.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .query(&[
                ("from", from),
                ("target", target),
                ("amount", &amount.to_string()),
                ("by_amount_in", if by_amount_in { "true" } else { "false" }),
            ])
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(e, self.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body: FindRoutesResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;

        let router = body.data.ok_or(SourceError::NoRoute)?;
        tracing::debug!(
            paths = router.paths.len(),
            amount_out = %router.amount_out,
            "aggregator returned routes"
        );
        Ok(router.into_router_data(by_amount_in))
    }
}

/// Accept amounts serialized as either decimal strings or JSON numbers
fn amount_field<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    let parsed = match &value {
        serde_json::Value::String(s) => U256::from_dec_str(s).ok(),
        serde_json::Value::Number(n) => n.as_u64().map(U256::from),
        _ => None,
    };
    parsed.ok_or_else(|| serde::de::Error::custom(format!("invalid amount: {value}")))
}

fn amount_zero() -> U256 {
    U256::zero()
}

#[derive(Debug, Deserialize)]
struct FindRoutesResponse {
    #[serde(default)]
    data: Option<RouterWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouterWire {
    #[serde(default, alias = "quoteID")]
    quote_id: Option<String>,
    #[serde(deserialize_with = "amount_field", default = "amount_zero")]
    amount_in: U256,
    #[serde(deserialize_with = "amount_field", default = "amount_zero")]
    amount_out: U256,
    #[serde(default)]
    paths: Vec<PathWire>,
    #[serde(default)]
    insufficient_liquidity: bool,
    #[serde(default)]
    packages: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PathWire {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    from: Option<String>,
    #[serde(default, alias = "to")]
    target: Option<String>,
    #[serde(default)]
    fee_rate: f64,
    #[serde(deserialize_with = "amount_field", default = "amount_zero")]
    amount_in: U256,
    #[serde(deserialize_with = "amount_field", default = "amount_zero")]
    amount_out: U256,
    #[serde(default)]
    direction: Option<bool>,
    #[serde(default)]
    published_at: Option<String>,
    /// Nested hop list for multi-hop paths
    #[serde(default)]
    path: Vec<HopWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HopWire {
    #[serde(default, alias = "coinIn")]
    from: Option<String>,
    #[serde(default, alias = "to", alias = "coinOut")]
    target: Option<String>,
}

impl PathWire {
    /// Endpoints of the path: flat fields first, else the first/last nested
    /// hop. Paths with undeterminable endpoints get empty strings and are
    /// filtered out by the engine.
    fn endpoints(&self) -> (String, String) {
        if let (Some(from), Some(target)) = (&self.from, &self.target) {
            return (from.clone(), target.clone());
        }
        let from = self
            .from
            .clone()
            .or_else(|| self.path.first().and_then(|h| h.from.clone()))
            .unwrap_or_default();
        let target = self
            .target
            .clone()
            .or_else(|| self.path.last().and_then(|h| h.target.clone()))
            .unwrap_or_default();
        (from, target)
    }
}

impl RouterWire {
    fn into_router_data(self, by_amount_in: bool) -> RouterData {
        let paths = self
            .paths
            .into_iter()
            .map(|p| {
                let (from, target) = p.endpoints();
                RouterPath {
                    id: p.id.unwrap_or_default(),
                    provider: p.provider.unwrap_or_else(|| "Cetus Aggregator".to_string()),
                    from,
                    target,
                    fee_rate: p.fee_rate,
                    amount_in: p.amount_in,
                    amount_out: p.amount_out,
                    direction: p.direction,
                    published_at: p.published_at,
                    extended_details: None,
                }
            })
            .collect();

        RouterData {
            quote_id: self.quote_id.unwrap_or_else(|| "aggregator-quote".to_string()),
            amount_in: self.amount_in,
            amount_out: self.amount_out,
            by_amount_in,
            paths,
            insufficient_liquidity: self.insufficient_liquidity,
            packages: self.packages,
        }
    }
}
