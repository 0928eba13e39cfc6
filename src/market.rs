//! Spot price collaborator.
//!
//! USD spot prices for the registry symbols, fetched from CoinGecko with a
//! short-TTL cache. Unlike the quote cache this one deliberately serves a
//! stale entry (marked `stale: true`) when a fresh fetch fails and a prior
//! value exists; quotes must never be stale, display prices may be.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;

const COINGECKO_BASE: &str = "https://api.coingecko.com/api/v3";
const SPOT_CACHE_TTL_MS: u64 = 30_000;
const SPOT_TIMEOUT_MS: u64 = 5_000;

/// Candidate CoinGecko ids per symbol, tried in order. USDC keeps a second
/// id because CoinGecko has renamed it before.
fn coingecko_ids(symbol: &str) -> &'static [&'static str] {
    match symbol.to_uppercase().as_str() {
        "SUI" => &["sui"],
        "CETUS" => &["cetus-protocol"],
        "USDC" | "WUSDC" => &["usdc", "usd-coin"],
        _ => &[],
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SpotPrice {
    /// USD price
    pub data: f64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SpotError {
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("spot price unavailable: {0}")]
    Unavailable(String),
}

struct SpotEntry {
    price: f64,
    fetched: Instant,
}

pub struct SpotClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    demo_key: Option<String>,
    ttl: Duration,
    cache: RwLock<HashMap<String, SpotEntry>>,
}

impl SpotClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(SPOT_TIMEOUT_MS))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
            api_key: None,
            demo_key: None,
            ttl: Duration::from_millis(SPOT_CACHE_TTL_MS),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_env() -> Self {
        let base =
            std::env::var("COINGECKO_URL").unwrap_or_else(|_| COINGECKO_BASE.to_string());
        let mut client = Self::new(base);
        client.api_key = std::env::var("COINGECKO_API_KEY").ok().filter(|v| !v.is_empty());
        client.demo_key = std::env::var("COINGECKO_DEMO_KEY").ok().filter(|v| !v.is_empty());
        client
    }

    /// Spot price for a registry symbol. Fresh cache entry first, then a
    /// live fetch trying each candidate id, then stale-with-flag.
    pub async fn spot(&self, symbol: &str) -> Result<SpotPrice, SpotError> {
        let ids = coingecko_ids(symbol);
        if ids.is_empty() {
            return Err(SpotError::UnknownSymbol(symbol.to_string()));
        }
        let key = symbol.to_uppercase();

        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&key) {
                if entry.fetched.elapsed() < self.ttl {
                    return Ok(SpotPrice {
                        data: entry.price,
                        stale: false,
                    });
                }
            }
        }

        let mut last_error = String::new();
        for id in ids {
            match self.fetch_spot(id).await {
                Ok(price) => {
                    self.cache.write().await.insert(
                        key,
                        SpotEntry {
                            price,
                            fetched: Instant::now(),
                        },
                    );
                    return Ok(SpotPrice {
                        data: price,
                        stale: false,
                    });
                }
                Err(e) => {
                    tracing::debug!(id, error = %e, "spot fetch failed, trying next id");
                    last_error = e;
                }
            }
        }

        // expired entry beats no answer for a display price
        if let Some(entry) = self.cache.read().await.get(&key) {
            tracing::warn!(symbol = %key, "serving stale spot price");
            return Ok(SpotPrice {
                data: entry.price,
                stale: true,
            });
        }

        Err(SpotError::Unavailable(last_error))
    }

    async fn fetch_spot(&self, coin_id: &str) -> Result<f64, String> {
        let url = format!(
            "{}/simple/price?ids={coin_id}&vs_currencies=usd",
            self.base_url.trim_end_matches('/')
        );
        let mut request = self.http.get(&url).header("accept", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-pro-api-key", key);
        }
        if let Some(key) = &self.demo_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("status {status} for {coin_id}"));
        }
        let body: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;
        body.get(coin_id)
            .and_then(|v| v.get("usd"))
            .and_then(|v| v.as_f64())
            .ok_or_else(|| format!("no usd price for {coin_id}"))
    }
}
