//! Token registry and coin type normalization.
//!
//! Maps display symbols to on-chain `address::module::Type` identifiers per
//! network, and canonicalizes type strings so that identifiers differing only
//! by address zero-padding compare equal.

use serde::{Deserialize, Serialize};

/// Which Sui network the service quotes against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }

    /// Read `SUI_NETWORK` from the environment. Anything other than
    /// "testnet" selects mainnet.
    pub fn from_env() -> Self {
        match std::env::var("SUI_NETWORK") {
            Ok(v) if v.eq_ignore_ascii_case("testnet") => Network::Testnet,
            _ => Network::Mainnet,
        }
    }
}

/// A registered token: display symbol, full coin type, atomic-unit decimals
#[derive(Debug, Clone, Serialize)]
pub struct TokenInfo {
    pub symbol: &'static str,
    pub coin_type: &'static str,
    pub decimals: u8,
}

const MAINNET_TOKENS: &[TokenInfo] = &[
    TokenInfo { symbol: "SUI", coin_type: "0x2::sui::SUI", decimals: 9 },
    TokenInfo {
        symbol: "USDC",
        coin_type: "0xdba34672e30cb065b1f93e3ab55318768fd6fef66c15942c9f7cb846e2f900e7::usdc::USDC",
        decimals: 6,
    },
    TokenInfo {
        symbol: "CETUS",
        coin_type: "0x06864a6f921804860930db6ddbe2e16acdf8504495ea7481637a1c8b9a8fe54b::cetus::CETUS",
        decimals: 9,
    },
    TokenInfo {
        symbol: "wUSDC",
        coin_type: "0x5d4b302506645c37ff133b98c4b50a5ae14841659738d6d733d59d0d217a93bf::coin::COIN",
        decimals: 6,
    },
];

const TESTNET_TOKENS: &[TokenInfo] = &[
    TokenInfo { symbol: "SUI", coin_type: "0x2::sui::SUI", decimals: 9 },
    TokenInfo {
        symbol: "USDC",
        coin_type: "0xa1ec7fc00a6f40db9693ad1415d0c193ad3906494428cf252621037bd7117e29::usdc::USDC",
        decimals: 6,
    },
    TokenInfo {
        symbol: "CETUS",
        coin_type: "0x06864a6f921804860930db6ddbe2e16acdf8504495ea7481637a1c8b9a8fe54b::cetus::CETUS",
        decimals: 9,
    },
];

/// Registered tokens for a network
pub fn tokens(network: Network) -> &'static [TokenInfo] {
    match network {
        Network::Mainnet => MAINNET_TOKENS,
        Network::Testnet => TESTNET_TOKENS,
    }
}

/// Resolve user input (a bare symbol like "SUI" or a full coin type) into a
/// full coin type string. Returns `None` for unknown symbols.
pub fn resolve_coin_type(network: Network, input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains("::") {
        return Some(trimmed.to_string());
    }
    tokens(network)
        .iter()
        .find(|t| t.symbol.eq_ignore_ascii_case(trimmed))
        .map(|t| t.coin_type.to_string())
}

/// Canonicalize a Sui address: strip the `0x` prefix, require hex digits,
/// left-pad to 64 characters, lowercase. Returns `None` if the input is not
/// a valid address.
pub fn normalize_address(addr: &str) -> Option<String> {
    let hex = addr.strip_prefix("0x").unwrap_or(addr);
    if hex.is_empty() || hex.len() > 64 {
        return None;
    }
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{:0>64}", hex.to_ascii_lowercase()))
}

/// Whether a string is a plausible Sui address (used for recipient checks)
pub fn is_valid_sui_address(addr: &str) -> bool {
    normalize_address(addr).is_some()
}

/// Canonical form of a coin type for comparisons. The address segment of an
/// `address::module::Type` identifier is zero-padded to full width and the
/// whole string is lowercased, so `0x2::sui::SUI` and `0x02::sui::SUI`
/// normalize identically. Inputs that do not look like a three-part type are
/// lowercased as-is.
pub fn normalize_coin_type(raw: &str) -> String {
    let parts: Vec<&str> = raw.split("::").collect();
    if parts.len() < 3 {
        return raw.to_ascii_lowercase();
    }
    let addr = match normalize_address(parts[0]) {
        Some(a) => a,
        // keep the original segment if it is not a valid address
        None => parts[0].to_string(),
    };
    let rest = parts[1..].join("::");
    format!("{}::{}", addr, rest).to_ascii_lowercase()
}

/// Atomic-unit decimals for a coin type. Registry first, then the same
/// heuristics the UI uses for unregistered USDC variants, defaulting to 9.
pub fn coin_decimals(network: Network, coin_type: &str) -> u8 {
    let normalized = normalize_coin_type(coin_type);
    for token in tokens(network) {
        if normalize_coin_type(token.coin_type) == normalized {
            return token.decimals;
        }
    }
    if normalized.contains("::usdc::usdc") || normalized.contains("::coin::coin") {
        return 6;
    }
    9
}

/// Display symbol for a coin type, `UNKNOWN` when unregistered
pub fn token_symbol(network: Network, coin_type: &str) -> String {
    let normalized = normalize_coin_type(coin_type);
    for token in tokens(network) {
        if normalize_coin_type(token.coin_type) == normalized {
            return token.symbol.to_string();
        }
    }
    "UNKNOWN".to_string()
}
