//! Atomic-amount parsing, fixed-point formatting and price comparison.
//!
//! All amount arithmetic is big-integer; floats appear only in the
//! display-oriented percentage of a comparison, derived after integer
//! scaling.

use primitive_types::U256;

use crate::quoting::types::{Better, Comparison};

/// Parse a decimal string in a token's atomic unit
pub fn parse_atomic(s: &str) -> Result<U256, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("amount is empty".to_string());
    }
    U256::from_dec_str(trimmed).map_err(|_| format!("invalid amount: {trimmed}"))
}

/// Render an atomic amount as a fixed-point decimal string via integer
/// division and padding. Trailing zero fraction digits are trimmed, and a
/// fully-zero fraction drops the decimal point entirely ("5.000000" -> "5",
/// never "5.").
pub fn format_units(amount: U256, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let base = U256::from(10u64).pow(U256::from(decimals));
    let whole = amount / base;
    let frac = amount % base;
    if frac.is_zero() {
        return whole.to_string();
    }
    let frac_str = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    let trimmed = frac_str.trim_end_matches('0');
    if trimmed.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, trimmed)
    }
}

/// Compare aggregator output against the direct-pool output. Returns `None`
/// when the direct output is zero (nothing meaningful to compare against).
/// The percentage numerator is scaled by 10000 before division so the
/// comparative magnitude carries no float error; only the final display
/// value is floating-point.
pub fn compute_comparison(aggregator_out: U256, direct_out: U256) -> Option<Comparison> {
    if direct_out.is_zero() {
        return None;
    }

    let (savings_abs, better) = if aggregator_out > direct_out {
        (aggregator_out - direct_out, Better::Aggregator)
    } else if aggregator_out < direct_out {
        (direct_out - aggregator_out, Better::DirectPool)
    } else {
        (U256::zero(), Better::Equal)
    };

    let scaled = savings_abs.saturating_mul(U256::from(10_000u64)) / direct_out;
    let savings_pct = scaled.min(U256::from(u64::MAX)).as_u64() as f64 / 100.0;

    Some(Comparison {
        direct_out,
        aggregator_out,
        savings_abs,
        savings_pct,
        better,
    })
}

/// Serde adapter: U256 amounts as decimal strings on the wire
pub mod serde_atomic {
    use primitive_types::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_dec_str(&s).map_err(|_| de::Error::custom(format!("invalid amount: {s}")))
    }
}
