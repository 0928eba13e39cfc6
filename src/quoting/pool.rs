//! Route Source B: direct CLMM pool quotes.
//!
//! Resolves a pool for the unordered token pair (static per-network table
//! first, then best-effort dynamic discovery), fetches the pool object over
//! Sui JSON-RPC, and estimates the swap locally against the pool's current
//! sqrt price and liquidity.

use async_trait::async_trait;
use primitive_types::U256;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::quoting::curve::{self, FEE_RATE_DENOMINATOR};
use crate::quoting::tokens::{normalize_coin_type, Network};
use crate::quoting::SourceError;

pub const DEFAULT_MAINNET_RPC_URL: &str = "https://fullnode.mainnet.sui.io:443";
pub const DEFAULT_TESTNET_RPC_URL: &str = "https://fullnode.testnet.sui.io:443";
pub const DEFAULT_POOLS_URL: &str = "https://api-sui.cetus.zone/v2/sui/stats_pools";
const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Single-hop quote from a direct pool. `amount_in` is the solved required
/// input in exact-output mode, never the nominal request amount.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectQuote {
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee_amount: U256,
    pub pool_address: String,
    pub a2b: bool,
    pub coin_type_a: String,
    pub coin_type_b: String,
    /// Fractional fee rate for display (ppm / 1e6)
    pub fee_rate: f64,
}

#[async_trait]
pub trait DirectPoolSource: Send + Sync {
    async fn direct_quote(
        &self,
        from: &str,
        to: &str,
        amount: U256,
        by_amount_in: bool,
    ) -> Result<DirectQuote, SourceError>;
}

/// Statically known pool addresses per network, keyed by unordered pair
struct StaticPool {
    coin_a: &'static str,
    coin_b: &'static str,
    address: &'static str,
}

const MAINNET_POOLS: &[StaticPool] = &[
    StaticPool {
        coin_a: "0x2::sui::SUI",
        coin_b: "0xdba34672e30cb065b1f93e3ab55318768fd6fef66c15942c9f7cb846e2f900e7::usdc::USDC",
        address: "0xcf994611fd4c48e277ce3ffd4d4364c914af2c3cbb05f7bf6facd371de688630",
    },
    StaticPool {
        coin_a: "0x2::sui::SUI",
        coin_b: "0x06864a6f921804860930db6ddbe2e16acdf8504495ea7481637a1c8b9a8fe54b::cetus::CETUS",
        address: "0x2e041f3fd93646dcc877f783c1f2b7fa62d30271bdef1f21ef002cebf857bded",
    },
];

const TESTNET_POOLS: &[StaticPool] = &[];

fn static_pools(network: Network) -> &'static [StaticPool] {
    match network {
        Network::Mainnet => MAINNET_POOLS,
        Network::Testnet => TESTNET_POOLS,
    }
}

/// A statically configured pool, for the listing endpoint
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownPool {
    pub coin_type_a: String,
    pub coin_type_b: String,
    pub pool_address: String,
}

pub fn known_pools(network: Network) -> Vec<KnownPool> {
    static_pools(network)
        .iter()
        .map(|p| KnownPool {
            coin_type_a: p.coin_a.to_string(),
            coin_type_b: p.coin_b.to_string(),
            pool_address: p.address.to_string(),
        })
        .collect()
}

pub struct DirectPoolClient {
    http: reqwest::Client,
    rpc_url: String,
    pools_url: String,
    network: Network,
    timeout_ms: u64,
}

impl DirectPoolClient {
    pub fn new(
        network: Network,
        rpc_url: impl Into<String>,
        pools_url: impl Into<String>,
        timeout_ms: u64,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            http,
            rpc_url: rpc_url.into(),
            pools_url: pools_url.into(),
            network,
            timeout_ms,
        }
    }

    pub fn from_env(network: Network) -> Self {
        let default_rpc = match network {
            Network::Mainnet => DEFAULT_MAINNET_RPC_URL,
            Network::Testnet => DEFAULT_TESTNET_RPC_URL,
        };
        let rpc_url = std::env::var("SUI_RPC_URL").unwrap_or_else(|_| default_rpc.to_string());
        let pools_url =
            std::env::var("POOLS_URL").unwrap_or_else(|_| DEFAULT_POOLS_URL.to_string());
        let timeout_ms = std::env::var("POOL_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        Self::new(network, rpc_url, pools_url, timeout_ms)
    }

    /// Resolve a pool address for the unordered pair: static table first,
    /// then dynamic discovery.
    async fn resolve_pool(&self, from: &str, to: &str) -> Result<String, SourceError> {
        let nf = normalize_coin_type(from);
        let nt = normalize_coin_type(to);

        for pool in static_pools(self.network) {
            let na = normalize_coin_type(pool.coin_a);
            let nb = normalize_coin_type(pool.coin_b);
            if (na == nf && nb == nt) || (na == nt && nb == nf) {
                return Ok(pool.address.to_string());
            }
        }

        self.discover_pool(&nf, &nt).await
    }

    /// Best-effort discovery against the pools stats endpoint. When several
    /// pools exist for the pair, the highest-liquidity pool wins; ties break
    /// to the lexicographically smallest address so repeated calls resolve
    /// identically.
    async fn discover_pool(&self, nf: &str, nt: &str) -> Result<String, SourceError> {
        let response = self
            .http
            .get(&self.pools_url)
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(e, self.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body: PoolListResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;

        let mut best: Option<(U256, String)> = None;
        for pool in body.data.map(|d| d.pools).unwrap_or_default() {
            let na = normalize_coin_type(&pool.coin_type_a);
            let nb = normalize_coin_type(&pool.coin_type_b);
            if !((na == *nf && nb == *nt) || (na == *nt && nb == *nf)) {
                continue;
            }
            let liquidity = U256::from_dec_str(&pool.liquidity).unwrap_or_default();
            let candidate = (liquidity, pool.pool_address);
            best = Some(match best.take() {
                None => candidate,
                Some(current) => {
                    if candidate.0 > current.0
                        || (candidate.0 == current.0 && candidate.1 < current.1)
                    {
                        candidate
                    } else {
                        current
                    }
                }
            });
        }

        match best {
            Some((_, address)) => {
                tracing::debug!(pool = %address, "discovered pool for pair");
                Ok(address)
            }
            None => Err(SourceError::NoPool),
        }
    }

    /// Fetch the pool object over Sui JSON-RPC and extract the curve inputs
    async fn fetch_pool_state(&self, pool_address: &str) -> Result<PoolState, SourceError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "sui_getObject",
            "params": [pool_address, {"showContent": true, "showType": true}],
        });

        let response = self
            .http
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(e, self.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;

        if let Some(err) = body.get("error") {
            return Err(SourceError::Rpc(err.to_string()));
        }

        let data = body
            .pointer("/result/data")
            .ok_or_else(|| SourceError::Malformed("missing object data".to_string()))?;
        parse_pool_object(data)
    }
}

#[async_trait]
impl DirectPoolSource for DirectPoolClient {
    async fn direct_quote(
        &self,
        from: &str,
        to: &str,
        amount: U256,
        by_amount_in: bool,
    ) -> Result<DirectQuote, SourceError> {
        let pool_address = self.resolve_pool(from, to).await?;
        let state = self.fetch_pool_state(&pool_address).await?;

        let nf = normalize_coin_type(from);
        let a2b = if nf == normalize_coin_type(&state.coin_type_a) {
            true
        } else if nf == normalize_coin_type(&state.coin_type_b) {
            false
        } else {
            return Err(SourceError::NoPool);
        };

        let estimate = curve::compute_swap(
            state.sqrt_price,
            state.liquidity,
            state.fee_rate,
            a2b,
            by_amount_in,
            amount,
        )?;

        Ok(DirectQuote {
            amount_in: estimate.amount_in,
            amount_out: estimate.amount_out,
            fee_amount: estimate.fee_amount,
            pool_address,
            a2b,
            coin_type_a: state.coin_type_a,
            coin_type_b: state.coin_type_b,
            fee_rate: state.fee_rate as f64 / FEE_RATE_DENOMINATOR as f64,
        })
    }
}

#[derive(Debug, Deserialize)]
struct PoolListResponse {
    #[serde(default)]
    data: Option<PoolListData>,
}

#[derive(Debug, Deserialize)]
struct PoolListData {
    #[serde(default, alias = "lp_list")]
    pools: Vec<DiscoveredPool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscoveredPool {
    #[serde(alias = "address", alias = "pool_address")]
    pool_address: String,
    #[serde(alias = "coin_type_a")]
    coin_type_a: String,
    #[serde(alias = "coin_type_b")]
    coin_type_b: String,
    #[serde(default)]
    liquidity: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PoolState {
    coin_type_a: String,
    coin_type_b: String,
    sqrt_price: u128,
    liquidity: u128,
    fee_rate: u64,
}

fn field_str<'a>(fields: &'a serde_json::Value, name: &str) -> Result<&'a str, SourceError> {
    fields
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| SourceError::Malformed(format!("missing pool field: {name}")))
}

fn parse_u128_field(fields: &serde_json::Value, name: &str) -> Result<u128, SourceError> {
    field_str(fields, name)?
        .parse()
        .map_err(|_| SourceError::Malformed(format!("invalid pool field: {name}")))
}

/// Split the type parameters of `..::pool::Pool<A, B>`, respecting nesting
fn pool_type_params(object_type: &str) -> Result<(String, String), SourceError> {
    let open = object_type
        .find('<')
        .ok_or_else(|| SourceError::Malformed(format!("not a pool type: {object_type}")))?;
    let close = object_type
        .rfind('>')
        .ok_or_else(|| SourceError::Malformed(format!("not a pool type: {object_type}")))?;
    let inner = &object_type[open + 1..close];

    let mut depth = 0usize;
    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();
    for c in inner.chars() {
        match c {
            '<' => {
                depth += 1;
                current.push(c);
            }
            '>' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    parts.push(current.trim().to_string());

    if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
        return Err(SourceError::Malformed(format!(
            "unexpected pool type parameters: {object_type}"
        )));
    }
    Ok((parts[0].clone(), parts[1].clone()))
}

fn parse_pool_object(data: &serde_json::Value) -> Result<PoolState, SourceError> {
    let object_type = data
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| SourceError::Malformed("missing object type".to_string()))?;
    let (coin_type_a, coin_type_b) = pool_type_params(object_type)?;

    let fields = data
        .pointer("/content/fields")
        .ok_or_else(|| SourceError::Malformed("missing pool content".to_string()))?;

    let fee_rate = match fields.get("fee_rate") {
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    };

    Ok(PoolState {
        coin_type_a,
        coin_type_b,
        sqrt_price: parse_u128_field(fields, "current_sqrt_price")?,
        liquidity: parse_u128_field(fields, "liquidity")?,
        fee_rate,
    })
}
