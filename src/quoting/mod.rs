//! Swap quote routing domain.
//!
//! Queries a multi-hop aggregator and a direct CLMM pool concurrently,
//! reconciles their results into one unified quote shape, and caches the
//! outcome. The reconciliation engine lives in [`engine`]; the two route
//! sources are adapters behind traits so they can be mocked in tests.

pub mod aggregator;
pub mod amounts;
pub mod cache;
pub mod curve;
pub mod engine;
pub mod pool;
pub mod tokens;
pub mod types;

pub use engine::{QuoteEngine, QuoteParams};
pub use types::{Quote, QuoteResult};

/// Failure of a single route source. Always recovered locally: it feeds the
/// fallback decision and, at worst, the combined error-quote message. Never
/// surfaced raw to API callers.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("malformed upstream response: {0}")]
    Malformed(String),

    #[error("no valid routes for requested pair")]
    NoRoute,

    #[error("no pool available for pair")]
    NoPool,

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error(transparent)]
    Curve(#[from] curve::CurveError),
}

impl SourceError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(timeout_ms)
        } else {
            SourceError::Network(err.to_string())
        }
    }
}
