//! Transaction plan builder.
//!
//! Consumes the unified quote and emits an ordered, serializable operation
//! list an external execution layer can sign. The builder switches only on
//! the quote's structural shape: every executable quote reports the
//! aggregator source, so there is exactly one build path and no
//! per-provenance branching. Slippage is applied here, not in the engine.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quoting::amounts::serde_atomic;
use crate::quoting::tokens::is_valid_sui_address;
use crate::quoting::types::{Quote, QuoteSource, RouterData};

pub const SLIPPAGE_DENOMINATOR: u64 = 10_000;
pub const DEFAULT_SLIPPAGE_BPS: u64 = 50;
pub const MAX_SLIPPAGE_BPS: u64 = 5_000;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("quote is not executable: {0}")]
    NotExecutable(String),

    #[error("slippage out of range: {0} bps")]
    InvalidSlippage(u64),

    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),
}

/// Static plan configuration, read once at startup
#[derive(Debug, Clone)]
pub struct PlanConfig {
    /// Package that publishes `swap_helper` (analytics event + receipts)
    pub swap_package_id: String,
    /// Referral partner object id, when configured
    pub partner_id: Option<String>,
    pub enable_receipts: bool,
}

impl PlanConfig {
    pub fn from_env(default_swap_package_id: &str) -> Self {
        let swap_package_id = std::env::var("SWAP_PACKAGE_ID")
            .unwrap_or_else(|_| default_swap_package_id.to_string());
        let partner_id = std::env::var("CETUS_PARTNER_ID")
            .ok()
            .filter(|v| !v.is_empty());
        let enable_receipts = std::env::var("ENABLE_RECEIPTS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self {
            swap_package_id,
            partner_id,
            enable_receipts,
        }
    }
}

/// Per-request plan options
#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub sender: String,
    pub slippage_bps: u64,
    /// Alternate candidate route to execute instead of the default
    pub route_id: Option<usize>,
    /// Zap mode: deliver the output to this address instead of the sender
    pub zap_recipient: Option<String>,
}

/// Referral gating outcome. Disabled states carry the reason for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerInfo {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<String>,
}

impl PartnerInfo {
    fn disabled(reason: &str) -> Self {
        Self {
            enabled: false,
            reason: Some(reason.to_string()),
            partner_id: None,
        }
    }
}

/// One signable operation. Ordered; the execution layer replays them in
/// sequence against a programmable transaction block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PlanOp {
    /// Split the input amount off the sender's balance
    #[serde(rename_all = "camelCase")]
    SplitInput {
        coin_type: String,
        #[serde(with = "serde_atomic")]
        amount: U256,
    },
    /// Execute the router payload with a slippage-derived amount limit
    #[serde(rename_all = "camelCase")]
    RouterSwap {
        router: RouterData,
        slippage_bps: u64,
        /// Minimum output (exact-in) or maximum input (exact-out)
        #[serde(with = "serde_atomic")]
        limit_amount: U256,
        #[serde(skip_serializing_if = "Option::is_none")]
        partner: Option<String>,
    },
    /// Analytics move call appended to every swap
    #[serde(rename_all = "camelCase")]
    RecordSwapEvent {
        target: String,
        from_coin_type: String,
        to_coin_type: String,
        #[serde(with = "serde_atomic")]
        amount_in: U256,
        #[serde(with = "serde_atomic")]
        amount_out: U256,
    },
    /// Optional on-chain receipt object, minted to the sender
    #[serde(rename_all = "camelCase")]
    MintReceipt {
        target: String,
        route_label: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        zap_recipient: Option<String>,
    },
    /// Deliver the output coin
    #[serde(rename_all = "camelCase")]
    TransferOutput {
        coin_type: String,
        recipient: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPlan {
    pub sender: String,
    pub from_coin_type: String,
    pub to_coin_type: String,
    #[serde(with = "serde_atomic")]
    pub amount_in: U256,
    #[serde(with = "serde_atomic")]
    pub amount_out: U256,
    pub by_amount_in: bool,
    pub slippage_bps: u64,
    /// Min output or max input after slippage, matching the swap op
    #[serde(with = "serde_atomic")]
    pub limit_amount: U256,
    pub partner: PartnerInfo,
    pub ops: Vec<PlanOp>,
}

/// Integer bps slippage adjustment. `is_min` shrinks the amount (minimum
/// acceptable output); otherwise it grows it (maximum acceptable input).
/// Floor division on both sides, matching on-chain checks.
pub fn adjust_for_slippage(amount: U256, slippage_bps: u64, is_min: bool) -> U256 {
    let base = U256::from(SLIPPAGE_DENOMINATOR);
    let bps = U256::from(slippage_bps);
    if is_min {
        amount * (base - bps) / base
    } else {
        amount * (base + bps) / base
    }
}

fn is_cetus_provider(provider: &str) -> bool {
    provider.to_lowercase().contains("cetus")
}

/// Referral is enabled only for zap transfers routed entirely through Cetus
/// pools, and only when a partner object is configured.
pub fn partner_info(config: &PlanConfig, quote: &Quote, zap_recipient: Option<&str>) -> PartnerInfo {
    let Some(recipient) = zap_recipient else {
        return PartnerInfo::disabled("swap mode");
    };
    if !is_valid_sui_address(recipient) {
        return PartnerInfo::disabled("recipient not set");
    }
    let Some(partner_id) = &config.partner_id else {
        return PartnerInfo::disabled("partner not configured");
    };
    if quote.source != QuoteSource::Aggregator {
        return PartnerInfo::disabled("non-aggregator quote");
    }
    let steps = &quote.route_details.steps;
    if steps.is_empty() {
        return PartnerInfo::disabled("route unavailable");
    }
    if steps.iter().any(|s| !is_cetus_provider(&s.provider)) {
        return PartnerInfo::disabled("external route");
    }
    PartnerInfo {
        enabled: true,
        reason: None,
        partner_id: Some(partner_id.clone()),
    }
}

/// Build the signable plan for a quote. The quote value is never mutated:
/// alternate-route selection derives a new quote first.
pub fn build_plan(
    config: &PlanConfig,
    quote: &Quote,
    options: &PlanOptions,
) -> Result<TransactionPlan, PlanError> {
    if quote.source != QuoteSource::Aggregator {
        return Err(PlanError::NotExecutable(
            "non-aggregator quote source".to_string(),
        ));
    }
    if options.slippage_bps > MAX_SLIPPAGE_BPS {
        return Err(PlanError::InvalidSlippage(options.slippage_bps));
    }
    if let Some(recipient) = &options.zap_recipient {
        if !is_valid_sui_address(recipient) {
            return Err(PlanError::InvalidRecipient(recipient.clone()));
        }
    }

    let selected = match options.route_id {
        Some(id) => quote.with_selected_route(id),
        None => quote.clone(),
    };

    // narrow the router payload to the selected path so the execution layer
    // replays exactly the route the caller approved
    let mut router = selected.router.clone();
    if let Some(path) = selected.selected_router_path() {
        router.paths = vec![path.clone()];
        router.amount_in = selected.amount_in;
        router.amount_out = selected.amount_out;
    }
    if router.paths.is_empty() {
        return Err(PlanError::NotExecutable("quote has no routes".to_string()));
    }

    let from_coin_type = router.paths[0].from.clone();
    let to_coin_type = router.paths[0].target.clone();

    let limit_amount = if selected.by_amount_in {
        adjust_for_slippage(selected.amount_out, options.slippage_bps, true)
    } else {
        adjust_for_slippage(selected.amount_in, options.slippage_bps, false)
    };

    let partner = partner_info(config, &selected, options.zap_recipient.as_deref());

    let route_label = selected
        .paths
        .iter()
        .find(|p| p.id == selected.selected_route_id)
        .map(|p| {
            p.steps
                .iter()
                .map(|s| format!("{}->{}", s.from_symbol, s.to_symbol))
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .unwrap_or_else(|| selected.route_details.path_text.clone());

    let mut ops = vec![
        PlanOp::SplitInput {
            coin_type: from_coin_type.clone(),
            amount: selected.amount_in,
        },
        PlanOp::RouterSwap {
            router: router.clone(),
            slippage_bps: options.slippage_bps,
            limit_amount,
            partner: if partner.enabled {
                partner.partner_id.clone()
            } else {
                None
            },
        },
        PlanOp::RecordSwapEvent {
            target: format!("{}::swap_helper::record_swap_event", config.swap_package_id),
            from_coin_type: from_coin_type.clone(),
            to_coin_type: to_coin_type.clone(),
            amount_in: selected.amount_in,
            amount_out: selected.amount_out,
        },
    ];

    if config.enable_receipts {
        let is_atomic_zap = options.zap_recipient.is_some();
        let helper = if is_atomic_zap {
            "mint_zap_receipt"
        } else {
            "mint_swap_receipt"
        };
        ops.push(PlanOp::MintReceipt {
            target: format!("{}::swap_helper::{helper}", config.swap_package_id),
            route_label,
            zap_recipient: options.zap_recipient.clone(),
        });
    }

    let recipient = options
        .zap_recipient
        .clone()
        .unwrap_or_else(|| options.sender.clone());
    ops.push(PlanOp::TransferOutput {
        coin_type: to_coin_type.clone(),
        recipient,
    });

    Ok(TransactionPlan {
        sender: options.sender.clone(),
        from_coin_type,
        to_coin_type,
        amount_in: selected.amount_in,
        amount_out: selected.amount_out,
        by_amount_in: selected.by_amount_in,
        slippage_bps: options.slippage_bps,
        limit_amount,
        partner,
        ops,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quoting::types::{
        QuoteMeta, RouteDetails, RouteKind, RoutePath, RouteStep, RouterPath,
    };
    use std::collections::BTreeMap;

    const SENDER: &str = "0x00000000000000000000000000000000000000000000000000000000000000ab";
    const RECIPIENT: &str = "0x00000000000000000000000000000000000000000000000000000000000000cd";

    fn step(provider: &str) -> RouteStep {
        RouteStep {
            from: "0x2::sui::SUI".into(),
            to: "0x9::usdc::USDC".into(),
            from_symbol: "SUI".into(),
            to_symbol: "USDC".into(),
            provider: provider.into(),
            fee_rate: Some(0.0025),
        }
    }

    fn router_path(amount_in: u64, amount_out: u64) -> RouterPath {
        RouterPath {
            id: "p0".into(),
            provider: "CETUS".into(),
            from: "0x2::sui::SUI".into(),
            target: "0x9::usdc::USDC".into(),
            fee_rate: 0.0025,
            amount_in: U256::from(amount_in),
            amount_out: U256::from(amount_out),
            direction: Some(true),
            published_at: None,
            extended_details: None,
        }
    }

    fn quote(provider: &str) -> Quote {
        let mk = |id: usize, out: u64| RoutePath {
            id,
            label: format!("route-{id}"),
            amount_in: U256::from(1_000_000_000u64),
            amount_out: U256::from(out),
            steps: vec![step(provider)],
            hop_count: 1,
            router_path: router_path(1_000_000_000, out),
        };
        Quote {
            source: QuoteSource::Aggregator,
            amount_in: U256::from(1_000_000_000u64),
            amount_out: U256::from(4_950_000u64),
            by_amount_in: true,
            estimated_fee: U256::zero(),
            router: RouterData {
                quote_id: "q".into(),
                amount_in: U256::from(1_000_000_000u64),
                amount_out: U256::from(4_950_000u64),
                by_amount_in: true,
                paths: vec![router_path(1_000_000_000, 4_950_000)],
                insufficient_liquidity: false,
                packages: BTreeMap::new(),
            },
            paths: vec![mk(0, 4_950_000), mk(1, 4_900_000)],
            selected_route_id: 0,
            pool_address: None,
            a2b: None,
            route_details: RouteDetails {
                kind: RouteKind::Aggregator,
                hops: 1,
                providers: vec![provider.into()],
                steps: vec![step(provider)],
                path_text: "SUI->USDC".into(),
            },
            comparison: None,
            meta: QuoteMeta::default(),
        }
    }

    fn config(partner: Option<&str>, receipts: bool) -> PlanConfig {
        PlanConfig {
            swap_package_id: "0xswap".into(),
            partner_id: partner.map(String::from),
            enable_receipts: receipts,
        }
    }

    fn options() -> PlanOptions {
        PlanOptions {
            sender: SENDER.into(),
            slippage_bps: 50,
            route_id: None,
            zap_recipient: None,
        }
    }

    #[test]
    fn test_adjust_for_slippage() {
        let min = adjust_for_slippage(U256::from(4_950_000u64), 50, true);
        assert_eq!(min, U256::from(4_925_250u64));
        let max = adjust_for_slippage(U256::from(1_000_000_000u64), 50, false);
        assert_eq!(max, U256::from(1_005_000_000u64));
        // zero slippage is the amount itself
        assert_eq!(
            adjust_for_slippage(U256::from(7u64), 0, true),
            U256::from(7u64)
        );
    }

    #[test]
    fn test_plan_op_ordering() {
        let plan = build_plan(&config(None, false), &quote("CETUS"), &options()).unwrap();
        assert_eq!(plan.ops.len(), 4);
        assert!(matches!(plan.ops[0], PlanOp::SplitInput { .. }));
        assert!(matches!(plan.ops[1], PlanOp::RouterSwap { .. }));
        assert!(matches!(plan.ops[2], PlanOp::RecordSwapEvent { .. }));
        assert!(matches!(plan.ops[3], PlanOp::TransferOutput { .. }));
    }

    #[test]
    fn test_plan_ends_with_transfer_to_sender() {
        let plan = build_plan(&config(None, false), &quote("CETUS"), &options()).unwrap();
        let PlanOp::TransferOutput { recipient, .. } = plan.ops.last().unwrap() else {
            panic!("last op must be the transfer");
        };
        assert_eq!(recipient, SENDER);
    }

    #[test]
    fn test_exact_in_limit_is_min_output() {
        let plan = build_plan(&config(None, false), &quote("CETUS"), &options()).unwrap();
        assert_eq!(plan.limit_amount, U256::from(4_925_250u64));
        let PlanOp::RouterSwap { limit_amount, .. } = &plan.ops[1] else {
            panic!()
        };
        assert_eq!(*limit_amount, plan.limit_amount);
    }

    #[test]
    fn test_exact_out_limit_is_max_input() {
        let mut q = quote("CETUS");
        q.by_amount_in = false;
        let plan = build_plan(&config(None, false), &q, &options()).unwrap();
        // 1_000_000_000 grossed up by 50 bps
        assert_eq!(plan.limit_amount, U256::from(1_005_000_000u64));
    }

    #[test]
    fn test_alternate_route_selection_narrows_router() {
        let mut opts = options();
        opts.route_id = Some(1);
        let plan = build_plan(&config(None, false), &quote("CETUS"), &opts).unwrap();
        assert_eq!(plan.amount_out, U256::from(4_900_000u64));
        let PlanOp::RouterSwap { router, .. } = &plan.ops[1] else {
            panic!()
        };
        assert_eq!(router.paths.len(), 1);
        assert_eq!(router.amount_out, U256::from(4_900_000u64));
    }

    #[test]
    fn test_rejects_error_source_quote() {
        let mut q = quote("CETUS");
        q.source = QuoteSource::Error;
        assert!(matches!(
            build_plan(&config(None, false), &q, &options()),
            Err(PlanError::NotExecutable(_))
        ));
    }

    #[test]
    fn test_rejects_excessive_slippage() {
        let mut opts = options();
        opts.slippage_bps = 9_000;
        assert!(matches!(
            build_plan(&config(None, false), &quote("CETUS"), &opts),
            Err(PlanError::InvalidSlippage(9_000))
        ));
    }

    #[test]
    fn test_rejects_bad_zap_recipient() {
        let mut opts = options();
        opts.zap_recipient = Some("not-an-address".into());
        assert!(matches!(
            build_plan(&config(None, false), &quote("CETUS"), &opts),
            Err(PlanError::InvalidRecipient(_))
        ));
    }

    #[test]
    fn test_partner_gating_reasons() {
        let cfg = config(Some("0xpartner"), false);
        let q = quote("CETUS");

        let swap_mode = partner_info(&cfg, &q, None);
        assert!(!swap_mode.enabled);
        assert_eq!(swap_mode.reason.as_deref(), Some("swap mode"));

        let bad_recipient = partner_info(&cfg, &q, Some("xyz"));
        assert_eq!(bad_recipient.reason.as_deref(), Some("recipient not set"));

        let no_partner = partner_info(&config(None, false), &q, Some(RECIPIENT));
        assert_eq!(no_partner.reason.as_deref(), Some("partner not configured"));

        let external = partner_info(&cfg, &quote("DEEPBOOK"), Some(RECIPIENT));
        assert_eq!(external.reason.as_deref(), Some("external route"));

        let enabled = partner_info(&cfg, &q, Some(RECIPIENT));
        assert!(enabled.enabled);
        assert_eq!(enabled.partner_id.as_deref(), Some("0xpartner"));
    }

    #[test]
    fn test_partner_provider_match_is_case_insensitive() {
        let cfg = config(Some("0xpartner"), false);
        let enabled = partner_info(&cfg, &quote("Cetus Aggregator"), Some(RECIPIENT));
        assert!(enabled.enabled);
    }

    #[test]
    fn test_zap_plan_with_receipts() {
        let cfg = config(Some("0xpartner"), true);
        let mut opts = options();
        opts.zap_recipient = Some(RECIPIENT.into());
        let plan = build_plan(&cfg, &quote("CETUS"), &opts).unwrap();

        assert!(plan.partner.enabled);
        let PlanOp::RouterSwap { partner, .. } = &plan.ops[1] else {
            panic!()
        };
        assert_eq!(partner.as_deref(), Some("0xpartner"));

        let PlanOp::MintReceipt {
            target,
            zap_recipient,
            ..
        } = &plan.ops[3]
        else {
            panic!("receipt op expected");
        };
        assert!(target.ends_with("::swap_helper::mint_zap_receipt"));
        assert_eq!(zap_recipient.as_deref(), Some(RECIPIENT));

        let PlanOp::TransferOutput { recipient, .. } = plan.ops.last().unwrap() else {
            panic!()
        };
        assert_eq!(recipient, RECIPIENT, "zap output goes to the recipient");
    }

    #[test]
    fn test_swap_receipt_target_without_zap() {
        let cfg = config(None, true);
        let plan = build_plan(&cfg, &quote("CETUS"), &options()).unwrap();
        let PlanOp::MintReceipt { target, .. } = &plan.ops[3] else {
            panic!()
        };
        assert!(target.ends_with("::swap_helper::mint_swap_receipt"));
    }

    #[test]
    fn test_plan_serializes_tagged_ops() {
        let plan = build_plan(&config(None, false), &quote("CETUS"), &options()).unwrap();
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["ops"][0]["op"], "splitInput");
        assert_eq!(json["ops"][1]["op"], "routerSwap");
        assert_eq!(json["slippageBps"], 50);
    }
}
