//! Quote reconciliation engine.
//!
//! Queries both route sources concurrently, validates and orders the
//! aggregator's candidate paths, and returns one unified quote. When the
//! aggregator yields nothing usable but the direct pool succeeds, the
//! direct result is transformed into a structurally identical
//! aggregator-shaped quote (the masquerade) so the plan builder never
//! special-cases provenance. When both sources fail the engine returns an
//! error quote as a value — business failures never become panics or HTTP
//! errors here.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use primitive_types::U256;

use crate::quoting::aggregator::AggregatorSource;
use crate::quoting::amounts::{compute_comparison, format_units};
use crate::quoting::cache::QuoteCache;
use crate::quoting::pool::{DirectPoolSource, DirectQuote};
use crate::quoting::tokens::{coin_decimals, normalize_coin_type, token_symbol, Network};
use crate::quoting::types::{
    CacheInfo, ErrorQuote, ExtendedDetails, Quote, QuoteMeta, QuoteResult, QuoteSource,
    RouteDetails, RouteKind, RoutePath, RouteStep, RouterData, RouterPath,
};
use crate::quoting::SourceError;

const SYNTHETIC_QUOTE_ID: &str = "synthetic-direct-quote";
const DIRECT_POOL_PROVIDER: &str = "CETUS";
const AGGREGATOR_PACKAGE_KEY: &str = "aggregator_v3";

/// Router v3 package ids the execution layer resolves swap calls against
fn aggregator_v3_package(network: Network) -> &'static str {
    match network {
        Network::Mainnet => "0xde5d696a79714ca5cb910b9aed99d41f67353abb00715ceaeb0663d57ee39640",
        Network::Testnet => "0x61da681cf2af95cb214a71596b49e662290065536984ed7e06b47e701ef547e3",
    }
}

/// One quote request. `requester` participates in the cache key because
/// some route sources are session-scoped to the sender address.
#[derive(Debug, Clone)]
pub struct QuoteParams {
    pub from_type: String,
    pub to_type: String,
    pub amount: U256,
    pub requester: String,
    pub by_amount_in: bool,
}

pub struct QuoteEngine {
    aggregator: Arc<dyn AggregatorSource>,
    direct: Arc<dyn DirectPoolSource>,
    cache: QuoteCache,
    network: Network,
    /// Package id stamped as `published_at` on synthetic paths
    swap_package_id: String,
}

impl QuoteEngine {
    pub fn new(
        network: Network,
        aggregator: Arc<dyn AggregatorSource>,
        direct: Arc<dyn DirectPoolSource>,
        cache: QuoteCache,
        swap_package_id: String,
    ) -> Self {
        Self {
            aggregator,
            direct,
            cache,
            network,
            swap_package_id,
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Resolve one quote, consulting the cache first. A cache hit is
    /// shape-identical to a miss apart from `meta.cache`. Error quotes are
    /// never cached.
    pub async fn quote(&self, params: &QuoteParams) -> QuoteResult {
        let key = QuoteCache::key(
            self.network,
            &params.from_type,
            &params.to_type,
            &params.amount.to_string(),
            &params.requester,
            params.by_amount_in,
        );

        if let Some((mut cached, age)) = self.cache.get(&key).await {
            cached.meta.cache = Some(CacheInfo {
                hit: true,
                age_ms: age.as_millis() as u64,
                ttl_ms: self.cache.ttl_ms(),
            });
            return QuoteResult::Quote(Box::new(cached));
        }

        let mut result = self.reconcile(params).await;
        if let QuoteResult::Quote(quote) = &result {
            self.cache.put(key, (**quote).clone()).await;
        }
        result.meta_mut().cache = Some(CacheInfo {
            hit: false,
            age_ms: 0,
            ttl_ms: self.cache.ttl_ms(),
        });
        result
    }

    /// The reconciliation itself: settle both sources, then decide.
    /// Terminal in all three outcomes; retry policy belongs to the caller.
    async fn reconcile(&self, params: &QuoteParams) -> QuoteResult {
        let aggregator_fut = async {
            let start = Instant::now();
            let result = self
                .aggregator
                .find_routes(
                    &params.from_type,
                    &params.to_type,
                    params.amount,
                    params.by_amount_in,
                )
                .await;
            (result, start.elapsed().as_millis() as u64)
        };
        let direct_fut = async {
            let start = Instant::now();
            let result = self
                .direct
                .direct_quote(
                    &params.from_type,
                    &params.to_type,
                    params.amount,
                    params.by_amount_in,
                )
                .await;
            (result, start.elapsed().as_millis() as u64)
        };

        // settle-all join: a fast failure on one side must not preempt a
        // slower success on the other
        let ((aggregator_res, aggregator_ms), (direct_res, direct_ms)) =
            tokio::join!(aggregator_fut, direct_fut);

        let mut meta = QuoteMeta {
            aggregator_latency_ms: Some(aggregator_ms),
            direct_latency_ms: Some(direct_ms),
            ..Default::default()
        };

        let validated = aggregator_res.and_then(|router| self.validate_routes(params, router));

        match validated {
            Ok(router) => {
                let direct = match direct_res {
                    Ok(d) => Some(d),
                    Err(e) => {
                        tracing::debug!(reason = %e, "direct pool quote unavailable for comparison");
                        None
                    }
                };
                QuoteResult::Quote(Box::new(self.build_aggregator_quote(params, router, direct, meta)))
            }
            Err(aggregator_err) => match direct_res {
                Ok(direct) => {
                    tracing::warn!(
                        reason = %aggregator_err,
                        pool = %direct.pool_address,
                        "aggregator unavailable, falling back to direct pool"
                    );
                    meta.fallback_from = Some(QuoteSource::Aggregator);
                    meta.fallback_reason = Some(aggregator_err.to_string());
                    meta.is_synthetic = true;
                    QuoteResult::Quote(Box::new(self.synthesize_quote(params, direct, meta)))
                }
                Err(direct_err) => {
                    let message = format!(
                        "No available route (Aggregator: {aggregator_err}; Direct pool: {direct_err})"
                    );
                    tracing::error!(%message, "quote failed on both sources");
                    QuoteResult::Error(ErrorQuote {
                        error: true,
                        error_message: message,
                        source: QuoteSource::Error,
                        meta,
                    })
                }
            },
        }
    }

    /// Drop paths whose endpoints do not match the requested pair (upstream
    /// proxies sometimes return nearby-pair matches), then order best price
    /// first: output descending for exact-input, required input ascending
    /// for exact-output. An emptied set counts as source-unavailable.
    fn validate_routes(
        &self,
        params: &QuoteParams,
        mut router: RouterData,
    ) -> Result<RouterData, SourceError> {
        let from = normalize_coin_type(&params.from_type);
        let to = normalize_coin_type(&params.to_type);

        let before = router.paths.len();
        router.paths.retain(|path| {
            normalize_coin_type(&path.from) == from && normalize_coin_type(&path.target) == to
        });
        if router.paths.len() < before {
            tracing::debug!(
                dropped = before - router.paths.len(),
                "filtered aggregator paths with mismatched endpoints"
            );
        }
        if router.paths.is_empty() {
            return Err(SourceError::NoRoute);
        }

        if params.by_amount_in {
            router.paths.sort_by(|a, b| b.amount_out.cmp(&a.amount_out));
        } else {
            router.paths.sort_by(|a, b| a.amount_in.cmp(&b.amount_in));
        }
        router.amount_in = router.paths[0].amount_in;
        router.amount_out = router.paths[0].amount_out;
        Ok(router)
    }

    fn route_step(&self, path: &RouterPath) -> RouteStep {
        RouteStep {
            from: path.from.clone(),
            to: path.target.clone(),
            from_symbol: token_symbol(self.network, &path.from),
            to_symbol: token_symbol(self.network, &path.target),
            provider: path.provider.clone(),
            fee_rate: Some(path.fee_rate),
        }
    }

    fn build_aggregator_quote(
        &self,
        params: &QuoteParams,
        router: RouterData,
        direct: Option<DirectQuote>,
        meta: QuoteMeta,
    ) -> Quote {
        let candidates: Vec<RoutePath> = router
            .paths
            .iter()
            .enumerate()
            .map(|(idx, path)| {
                let step = self.route_step(path);
                let out_display = format_units(
                    path.amount_out,
                    coin_decimals(self.network, &path.target),
                );
                RoutePath {
                    id: idx,
                    label: format!(
                        "{}->{} ({}): {} {}",
                        step.from_symbol, step.to_symbol, path.provider, out_display, step.to_symbol
                    ),
                    amount_in: path.amount_in,
                    amount_out: path.amount_out,
                    steps: vec![step],
                    hop_count: 1,
                    router_path: path.clone(),
                }
            })
            .collect();

        let best = &router.paths[0];
        let best_step = self.route_step(best);
        let comparison = direct
            .as_ref()
            .and_then(|d| compute_comparison(best.amount_out, d.amount_out));

        Quote {
            source: QuoteSource::Aggregator,
            amount_in: best.amount_in,
            amount_out: best.amount_out,
            by_amount_in: params.by_amount_in,
            // the aggregator folds fees into per-path amounts
            estimated_fee: U256::zero(),
            paths: candidates,
            selected_route_id: 0,
            pool_address: None,
            a2b: None,
            route_details: build_route_details(RouteKind::Aggregator, vec![best_step]),
            comparison,
            router,
            meta,
        }
    }

    /// Transform a direct-pool result into an aggregator-shaped quote.
    /// The synthetic path populates every field a real aggregator path
    /// carries; an incomplete synthesis would surface deep in the plan
    /// builder instead of at the quote boundary.
    fn synthesize_quote(&self, params: &QuoteParams, direct: DirectQuote, meta: QuoteMeta) -> Quote {
        let synthetic_path = RouterPath {
            // the pool address doubles as the path id so the execution
            // layer receives a valid on-chain address
            id: direct.pool_address.clone(),
            provider: DIRECT_POOL_PROVIDER.to_string(),
            from: params.from_type.clone(),
            target: params.to_type.clone(),
            fee_rate: direct.fee_rate,
            // solved required input in exact-output mode, not the nominal
            // request amount
            amount_in: direct.amount_in,
            amount_out: direct.amount_out,
            direction: Some(direct.a2b),
            published_at: Some(self.swap_package_id.clone()),
            extended_details: Some(ExtendedDetails {
                pool_address: direct.pool_address.clone(),
                coin_type_a: direct.coin_type_a.clone(),
                coin_type_b: direct.coin_type_b.clone(),
            }),
        };

        let mut packages = BTreeMap::new();
        packages.insert(
            AGGREGATOR_PACKAGE_KEY.to_string(),
            aggregator_v3_package(self.network).to_string(),
        );

        let router = RouterData {
            quote_id: SYNTHETIC_QUOTE_ID.to_string(),
            amount_in: direct.amount_in,
            amount_out: direct.amount_out,
            by_amount_in: params.by_amount_in,
            paths: vec![synthetic_path.clone()],
            insufficient_liquidity: false,
            packages,
        };

        let step = self.route_step(&synthetic_path);
        let candidate = RoutePath {
            id: 0,
            label: "Direct Pool (Atomic)".to_string(),
            amount_in: direct.amount_in,
            amount_out: direct.amount_out,
            steps: vec![step.clone()],
            hop_count: 1,
            router_path: synthetic_path,
        };

        Quote {
            source: QuoteSource::Aggregator,
            amount_in: direct.amount_in,
            amount_out: direct.amount_out,
            by_amount_in: params.by_amount_in,
            estimated_fee: direct.fee_amount,
            router,
            paths: vec![candidate],
            selected_route_id: 0,
            pool_address: Some(direct.pool_address),
            a2b: Some(direct.a2b),
            route_details: build_route_details(RouteKind::DirectPool, vec![step]),
            comparison: None,
            meta,
        }
    }
}

fn build_route_details(kind: RouteKind, steps: Vec<RouteStep>) -> RouteDetails {
    let mut providers: Vec<String> = Vec::new();
    for step in &steps {
        if !providers.contains(&step.provider) {
            providers.push(step.provider.clone());
        }
    }
    let path_text = steps
        .iter()
        .map(|s| format!("{}->{}", s.from_symbol, s.to_symbol))
        .collect::<Vec<_>>()
        .join(" | ");
    RouteDetails {
        kind,
        hops: steps.len(),
        providers,
        steps,
        path_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quoting::types::Better;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const SUI: &str = "0x2::sui::SUI";
    const USDC: &str = "0xdba34672e30cb065b1f93e3ab55318768fd6fef66c15942c9f7cb846e2f900e7::usdc::USDC";
    const OTHER: &str = "0x999::other::OTHER";

    fn wire_path(from: &str, target: &str, amount_in: u64, amount_out: u64) -> RouterPath {
        RouterPath {
            id: format!("p-{amount_out}"),
            provider: "CETUS".to_string(),
            from: from.to_string(),
            target: target.to_string(),
            fee_rate: 0.0025,
            amount_in: U256::from(amount_in),
            amount_out: U256::from(amount_out),
            direction: None,
            published_at: None,
            extended_details: None,
        }
    }

    struct MockAggregator {
        paths: Vec<RouterPath>,
        fail: Option<String>,
        calls: AtomicUsize,
    }

    impl MockAggregator {
        fn routes(paths: Vec<RouterPath>) -> Self {
            Self {
                paths,
                fail: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(reason: &str) -> Self {
            Self {
                paths: vec![],
                fail: Some(reason.to_string()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AggregatorSource for MockAggregator {
        async fn find_routes(
            &self,
            _from: &str,
            _target: &str,
            amount: U256,
            by_amount_in: bool,
        ) -> Result<RouterData, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(reason) = &self.fail {
                return Err(SourceError::Network(reason.clone()));
            }
            Ok(RouterData {
                quote_id: "q-mock".to_string(),
                amount_in: amount,
                amount_out: self.paths.first().map(|p| p.amount_out).unwrap_or_default(),
                by_amount_in,
                paths: self.paths.clone(),
                insufficient_liquidity: false,
                packages: BTreeMap::new(),
            })
        }
    }

    struct MockPool {
        quote: Option<DirectQuote>,
        fail: Option<String>,
        calls: AtomicUsize,
    }

    impl MockPool {
        fn with(quote: DirectQuote) -> Self {
            Self {
                quote: Some(quote),
                fail: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(reason: &str) -> Self {
            Self {
                quote: None,
                fail: Some(reason.to_string()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DirectPoolSource for MockPool {
        async fn direct_quote(
            &self,
            _from: &str,
            _to: &str,
            _amount: U256,
            _by_amount_in: bool,
        ) -> Result<DirectQuote, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match (&self.quote, &self.fail) {
                (Some(q), _) => Ok(q.clone()),
                (None, Some(reason)) => Err(SourceError::Network(reason.clone())),
                _ => Err(SourceError::NoPool),
            }
        }
    }

    fn direct_quote(amount_in: u64, amount_out: u64) -> DirectQuote {
        DirectQuote {
            amount_in: U256::from(amount_in),
            amount_out: U256::from(amount_out),
            fee_amount: U256::from(2_500u64),
            pool_address: "0xpool".to_string(),
            a2b: true,
            coin_type_a: SUI.to_string(),
            coin_type_b: USDC.to_string(),
            fee_rate: 0.0025,
        }
    }

    fn engine(aggregator: MockAggregator, pool: MockPool) -> QuoteEngine {
        QuoteEngine::new(
            Network::Mainnet,
            Arc::new(aggregator),
            Arc::new(pool),
            QuoteCache::new(Duration::from_secs(10), 50),
            "0xswap".to_string(),
        )
    }

    fn params(amount: u64) -> QuoteParams {
        QuoteParams {
            from_type: SUI.to_string(),
            to_type: USDC.to_string(),
            amount: U256::from(amount),
            requester: "0xabc".to_string(),
            by_amount_in: true,
        }
    }

    #[tokio::test]
    async fn test_aggregator_success_selects_best_path() {
        let aggregator = MockAggregator::routes(vec![
            wire_path(SUI, USDC, 1_000_000_000, 4_900_000),
            wire_path(SUI, USDC, 1_000_000_000, 4_950_000),
        ]);
        let engine = engine(aggregator, MockPool::with(direct_quote(1_000_000_000, 4_800_000)));

        let result = engine.quote(&params(1_000_000_000)).await;
        let quote = result.as_quote().expect("quote");

        assert_eq!(quote.source, QuoteSource::Aggregator);
        assert_eq!(quote.amount_out, U256::from(4_950_000u64));
        assert_eq!(quote.paths.len(), 2, "full candidate set retained");
        assert_eq!(quote.selected_route_id, 0);
        assert_eq!(quote.paths[0].amount_out, U256::from(4_950_000u64));
        assert!(!quote.meta.is_synthetic);

        let comparison = quote.comparison.as_ref().expect("both sources succeeded");
        assert_eq!(comparison.better, Better::Aggregator);
        assert_eq!(comparison.savings_abs, U256::from(150_000u64));
    }

    #[tokio::test]
    async fn test_mismatched_endpoints_filtered() {
        let aggregator = MockAggregator::routes(vec![
            wire_path(SUI, OTHER, 1_000, 9_999_999),
            wire_path("0x02::sui::SUI", USDC, 1_000, 4_900),
        ]);
        let engine = engine(aggregator, MockPool::failing("down"));

        let result = engine.quote(&params(1_000)).await;
        let quote = result.as_quote().expect("quote");
        // zero-padded address still matches; unrelated pair dropped
        assert_eq!(quote.paths.len(), 1);
        assert_eq!(quote.amount_out, U256::from(4_900u64));
        assert!(quote.comparison.is_none(), "no direct result to compare");
    }

    #[tokio::test]
    async fn test_all_paths_mismatched_triggers_fallback() {
        let aggregator = MockAggregator::routes(vec![wire_path(SUI, OTHER, 1_000, 5_000)]);
        let engine = engine(aggregator, MockPool::with(direct_quote(1_000, 4_800)));

        let result = engine.quote(&params(1_000)).await;
        let quote = result.as_quote().expect("fallback quote");
        assert!(quote.meta.is_synthetic);
        assert_eq!(
            quote.meta.fallback_reason.as_deref(),
            Some("no valid routes for requested pair")
        );
    }

    #[tokio::test]
    async fn test_fallback_synthesis_is_complete() {
        let aggregator = MockAggregator::failing("connection refused");
        let engine = engine(aggregator, MockPool::with(direct_quote(1_000_000_000, 4_800_000)));

        let result = engine.quote(&params(1_000_000_000)).await;
        let quote = result.as_quote().expect("fallback quote");

        // masquerade: reports aggregator even though the pool produced it
        assert_eq!(quote.source, QuoteSource::Aggregator);
        assert!(quote.meta.is_synthetic);
        assert_eq!(quote.meta.fallback_from, Some(QuoteSource::Aggregator));
        assert!(quote
            .meta
            .fallback_reason
            .as_deref()
            .unwrap()
            .contains("connection refused"));
        assert!(quote.comparison.is_none());

        // structural completeness: every field a real aggregator quote has
        assert_eq!(quote.router.paths.len(), 1);
        let path = &quote.router.paths[0];
        assert_eq!(path.id, "0xpool");
        assert_eq!(path.published_at.as_deref(), Some("0xswap"));
        assert!(path.extended_details.is_some());
        assert_eq!(
            quote.router.packages.get(AGGREGATOR_PACKAGE_KEY).unwrap(),
            aggregator_v3_package(Network::Mainnet)
        );
        assert_eq!(quote.pool_address.as_deref(), Some("0xpool"));
        assert_eq!(quote.a2b, Some(true));
        assert!(!quote.paths.is_empty());
        assert_eq!(quote.route_details.kind, RouteKind::DirectPool);
    }

    #[tokio::test]
    async fn test_exact_output_synthesis_carries_solved_input() {
        let aggregator = MockAggregator::failing("down");
        // requester asks for 4_800_000 out; the curve solved 1_003_000_000 in
        let engine = engine(aggregator, MockPool::with(direct_quote(1_003_000_000, 4_800_000)));

        let mut p = params(4_800_000);
        p.by_amount_in = false;
        let result = engine.quote(&p).await;
        let quote = result.as_quote().expect("fallback quote");

        assert_eq!(quote.amount_in, U256::from(1_003_000_000u64));
        assert_eq!(quote.router.amount_in, U256::from(1_003_000_000u64));
        assert!(!quote.by_amount_in);
    }

    #[tokio::test]
    async fn test_both_sources_failed() {
        let engine = engine(
            MockAggregator::failing("agg down"),
            MockPool::failing("pool down"),
        );

        let result = engine.quote(&params(1_000)).await;
        let QuoteResult::Error(err) = &result else {
            panic!("expected error quote");
        };
        assert!(err.error);
        assert_eq!(err.source, QuoteSource::Error);
        assert!(err.error_message.contains("agg down"));
        assert!(err.error_message.contains("pool down"));
        // latencies recorded even on failure
        assert!(err.meta.aggregator_latency_ms.is_some());
        assert!(err.meta.direct_latency_ms.is_some());
    }

    #[tokio::test]
    async fn test_cache_hit_on_second_call() {
        let aggregator = MockAggregator::routes(vec![wire_path(SUI, USDC, 1_000, 4_950)]);
        let engine = engine(aggregator, MockPool::failing("down"));

        let first = engine.quote(&params(1_000)).await;
        let first_cache = first.as_quote().unwrap().meta.cache.clone().unwrap();
        assert!(!first_cache.hit);

        let second = engine.quote(&params(1_000)).await;
        let second_quote = second.as_quote().unwrap();
        let second_cache = second_quote.meta.cache.clone().unwrap();
        assert!(second_cache.hit);
        assert_eq!(second_quote.amount_out, U256::from(4_950u64));
    }

    #[tokio::test]
    async fn test_cache_key_sensitivity_requester() {
        let aggregator = MockAggregator::routes(vec![wire_path(SUI, USDC, 1_000, 4_950)]);
        let engine = QuoteEngine::new(
            Network::Mainnet,
            Arc::new(aggregator),
            Arc::new(MockPool::failing("down")),
            QuoteCache::new(Duration::from_secs(10), 50),
            "0xswap".to_string(),
        );

        engine.quote(&params(1_000)).await;
        let mut other = params(1_000);
        other.requester = "0xdef".to_string();
        let result = engine.quote(&other).await;
        assert!(
            !result.as_quote().unwrap().meta.cache.as_ref().unwrap().hit,
            "requester change is a cache miss"
        );
    }

    #[tokio::test]
    async fn test_error_quotes_never_cached() {
        let aggregator = MockAggregator::failing("agg down");
        let pool = MockPool::failing("pool down");
        let engine = QuoteEngine::new(
            Network::Mainnet,
            Arc::new(aggregator),
            Arc::new(pool),
            QuoteCache::new(Duration::from_secs(10), 50),
            "0xswap".to_string(),
        );

        assert!(engine.quote(&params(1_000)).await.is_error());
        assert!(engine.quote(&params(1_000)).await.is_error());
        // second call hit the sources again rather than the cache: both
        // results carry a cache miss marker
        let third = engine.quote(&params(1_000)).await;
        let QuoteResult::Error(err) = third else {
            panic!()
        };
        assert!(!err.meta.cache.unwrap().hit);
    }
}
