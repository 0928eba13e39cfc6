//! Short-TTL quote cache.
//!
//! Absorbs repeated UI-driven requests for the same quote. Entries expire
//! lazily on read, error quotes are never stored, and the entry count is
//! bounded with oldest-insertion eviction. Owned by the engine instance so
//! tests construct a fresh cache each time.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::quoting::tokens::Network;
use crate::quoting::types::Quote;

pub const DEFAULT_TTL_MS: u64 = 5_000;
pub const DEFAULT_MAX_ENTRIES: usize = 200;

struct CacheEntry {
    value: Quote,
    inserted: Instant,
}

pub struct QuoteCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl QuoteCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    /// TTL and capacity from `QUOTE_CACHE_TTL_MS` / `QUOTE_CACHE_MAX`
    pub fn from_env() -> Self {
        let ttl_ms = std::env::var("QUOTE_CACHE_TTL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TTL_MS);
        let max_entries = std::env::var("QUOTE_CACHE_MAX")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_ENTRIES);
        Self::new(Duration::from_millis(ttl_ms), max_entries)
    }

    /// Cache key: every component change must be a miss
    pub fn key(
        network: Network,
        from: &str,
        to: &str,
        amount: &str,
        requester: &str,
        by_amount_in: bool,
    ) -> String {
        [
            network.as_str(),
            from,
            to,
            amount,
            requester,
            if by_amount_in { "in" } else { "out" },
        ]
        .join("|")
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl.as_millis() as u64
    }

    /// Fetch a live entry and its age. Expired entries are removed on the
    /// way out, never served.
    pub async fn get(&self, key: &str) -> Option<(Quote, Duration)> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(key) {
                let age = entry.inserted.elapsed();
                if age < self.ttl {
                    return Some((entry.value.clone(), age));
                }
            } else {
                return None;
            }
        }
        // expired: drop it
        self.entries.write().await.remove(key);
        None
    }

    /// Store a quote (last writer wins), pruning oldest entries over capacity
    pub async fn put(&self, key: String, value: Quote) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CacheEntry {
                value,
                inserted: Instant::now(),
            },
        );
        while entries.len() > self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => entries.remove(&k),
                None => break,
            };
        }
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
