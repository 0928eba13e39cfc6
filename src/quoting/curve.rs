//! CLMM swap estimation on a Q64.64 sqrt-price curve.
//!
//! Integer-only math over U256/U512: estimates a swap against the pool's
//! current sqrt price and active liquidity, applying the pool fee (parts per
//! million) on the input side. Outputs round down and inputs round up.
//! Exact-output mode solves for the required input.

use primitive_types::{U256, U512};

/// Pool fee rates are expressed in parts per million
pub const FEE_RATE_DENOMINATOR: u64 = 1_000_000;

fn q64() -> U256 {
    U256::one() << 64
}

#[derive(Debug, thiserror::Error)]
pub enum CurveError {
    #[error("pool has no active liquidity")]
    NoLiquidity,

    #[error("insufficient liquidity for requested amount")]
    InsufficientLiquidity,

    #[error("invalid fee rate: {0}")]
    InvalidFeeRate(u64),

    #[error("amount out of range for curve computation")]
    Overflow,
}

/// Result of a curve estimate. `amount_in` is the gross input including the
/// fee; in exact-output mode it is the solved required input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapEstimate {
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee_amount: U256,
    pub after_sqrt_price: U256,
}

fn div_ceil_512(num: U512, den: U512) -> U512 {
    let q = num / den;
    if num % den != U512::zero() {
        q + U512::one()
    } else {
        q
    }
}

fn to_u256(v: U512) -> Result<U256, CurveError> {
    U256::try_from(v).map_err(|_| CurveError::Overflow)
}

/// Estimate a swap within the pool's active liquidity range.
///
/// `a2b` is the direction relative to the pool's coin ordering (selling coin
/// A moves the sqrt price down). `amount` is the fixed side: input when
/// `by_amount_in`, desired output otherwise.
pub fn compute_swap(
    sqrt_price: u128,
    liquidity: u128,
    fee_rate: u64,
    a2b: bool,
    by_amount_in: bool,
    amount: U256,
) -> Result<SwapEstimate, CurveError> {
    if liquidity == 0 || sqrt_price == 0 {
        return Err(CurveError::NoLiquidity);
    }
    if fee_rate >= FEE_RATE_DENOMINATOR {
        return Err(CurveError::InvalidFeeRate(fee_rate));
    }
    if amount.is_zero() {
        return Ok(SwapEstimate {
            amount_in: U256::zero(),
            amount_out: U256::zero(),
            fee_amount: U256::zero(),
            after_sqrt_price: U256::from(sqrt_price),
        });
    }

    if by_amount_in {
        swap_exact_in(sqrt_price, liquidity, fee_rate, a2b, amount)
    } else {
        swap_exact_out(sqrt_price, liquidity, fee_rate, a2b, amount)
    }
}

fn swap_exact_in(
    sqrt_price: u128,
    liquidity: u128,
    fee_rate: u64,
    a2b: bool,
    amount_in: U256,
) -> Result<SwapEstimate, CurveError> {
    let fee = amount_in * U256::from(fee_rate) / U256::from(FEE_RATE_DENOMINATOR);
    let net = amount_in - fee;
    if net.is_zero() {
        return Err(CurveError::InsufficientLiquidity);
    }

    let sp = U256::from(sqrt_price);
    let l_shift = U256::from(liquidity) << 64;

    if a2b {
        // new_sqrt = L*Q*sp / (L*Q + net*sp); price moves down
        let extra = net.checked_mul(sp).ok_or(CurveError::Overflow)?;
        let den = l_shift.checked_add(extra).ok_or(CurveError::Overflow)?;
        let new_sqrt = to_u256(l_shift.full_mul(sp) / U512::from(den))?;
        // out (coin B) = L * (sp - new_sqrt) / Q, rounded down
        let amount_out = (U256::from(liquidity) * (sp - new_sqrt)) >> 64;
        Ok(SwapEstimate {
            amount_in,
            amount_out,
            fee_amount: fee,
            after_sqrt_price: new_sqrt,
        })
    } else {
        // delta = net*Q / L; price moves up
        let delta = to_u256(net.full_mul(q64()) / U512::from(liquidity))?;
        let new_sqrt = sp.checked_add(delta).ok_or(CurveError::Overflow)?;
        // out (coin A) = L*Q*(new-sp) / (new*sp), rounded down
        let num = U512::from(U256::from(liquidity)) * U512::from(delta) * U512::from(q64());
        let den = U512::from(new_sqrt) * U512::from(sp);
        let amount_out = to_u256(num / den)?;
        Ok(SwapEstimate {
            amount_in,
            amount_out,
            fee_amount: fee,
            after_sqrt_price: new_sqrt,
        })
    }
}

fn swap_exact_out(
    sqrt_price: u128,
    liquidity: u128,
    fee_rate: u64,
    a2b: bool,
    amount_out: U256,
) -> Result<SwapEstimate, CurveError> {
    let sp = U256::from(sqrt_price);
    let l = U256::from(liquidity);
    let l_shift = l << 64;

    let (net_in, new_sqrt) = if a2b {
        // out is coin B: sp - new = ceil(out*Q / L)
        let delta = to_u256(div_ceil_512(amount_out.full_mul(q64()), U512::from(l)))?;
        if delta >= sp {
            return Err(CurveError::InsufficientLiquidity);
        }
        let new_sqrt = sp - delta;
        // in (coin A) = L*Q*(sp-new) / (new*sp), rounded up
        let num = l_shift.full_mul(delta);
        let den = new_sqrt.full_mul(sp);
        (to_u256(div_ceil_512(num, den))?, new_sqrt)
    } else {
        // out is coin A: new = L*Q*sp / (L*Q - out*sp)
        let taken = amount_out.checked_mul(sp).ok_or(CurveError::Overflow)?;
        if taken >= l_shift {
            return Err(CurveError::InsufficientLiquidity);
        }
        let den = l_shift - taken;
        let new_sqrt = to_u256(div_ceil_512(l_shift.full_mul(sp), U512::from(den)))?;
        // in (coin B) = L*(new-sp) / Q, rounded up
        let num = l.full_mul(new_sqrt - sp);
        (to_u256(div_ceil_512(num, U512::from(q64())))?, new_sqrt)
    };

    // gross up the input so that net = in * (1 - fee_rate) still covers it
    let denom = U256::from(FEE_RATE_DENOMINATOR - fee_rate);
    let gross = to_u256(div_ceil_512(
        net_in.full_mul(U256::from(FEE_RATE_DENOMINATOR)),
        U512::from(denom),
    ))?;

    Ok(SwapEstimate {
        amount_in: gross,
        amount_out,
        fee_amount: gross - net_in,
        after_sqrt_price: new_sqrt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const Q64: u128 = 1u128 << 64;

    #[test]
    fn test_exact_in_a2b_unit_price() {
        // L = 1000, price 1: selling 1000 A halves the sqrt price,
        // releasing exactly 500 B.
        let est = compute_swap(Q64, 1000, 0, true, true, U256::from(1000u64)).unwrap();
        assert_eq!(est.amount_out, U256::from(500u64));
        assert_eq!(est.fee_amount, U256::zero());
        assert_eq!(est.after_sqrt_price, U256::from(Q64 / 2));
    }

    #[test]
    fn test_exact_in_b2a_unit_price() {
        let est = compute_swap(Q64, 1000, 0, false, true, U256::from(1000u64)).unwrap();
        assert_eq!(est.amount_out, U256::from(500u64));
        assert_eq!(est.after_sqrt_price, U256::from(2 * Q64));
    }

    #[test]
    fn test_exact_out_a2b_solves_input() {
        // inverse of test_exact_in_a2b_unit_price
        let est = compute_swap(Q64, 1000, 0, true, false, U256::from(500u64)).unwrap();
        assert_eq!(est.amount_in, U256::from(1000u64));
        assert_eq!(est.amount_out, U256::from(500u64));
    }

    #[test]
    fn test_exact_out_b2a_solves_input() {
        let est = compute_swap(Q64, 1000, 0, false, false, U256::from(500u64)).unwrap();
        assert_eq!(est.amount_in, U256::from(1000u64));
    }

    #[test]
    fn test_fee_applied_on_input() {
        // 0.25% fee: 10000 in, 25 fee, 9975 net
        let est = compute_swap(Q64, 1_000_000_000, 2500, true, true, U256::from(10_000u64)).unwrap();
        assert_eq!(est.fee_amount, U256::from(25u64));
        // tiny trade against deep liquidity at price 1: out ~ net
        assert!(est.amount_out <= U256::from(9_975u64));
        assert!(est.amount_out >= U256::from(9_970u64));
    }

    #[test]
    fn test_exact_out_fee_grossed_up() {
        let no_fee = compute_swap(Q64, 1_000_000_000, 0, true, false, U256::from(9_975u64)).unwrap();
        let with_fee =
            compute_swap(Q64, 1_000_000_000, 2500, true, false, U256::from(9_975u64)).unwrap();
        assert!(with_fee.amount_in > no_fee.amount_in);
        assert_eq!(
            with_fee.fee_amount,
            with_fee.amount_in - no_fee.amount_in,
            "fee is exactly the gross-up over the no-fee input"
        );
    }

    #[test]
    fn test_zero_liquidity_rejected() {
        let err = compute_swap(Q64, 0, 0, true, true, U256::from(1u64)).unwrap_err();
        assert!(matches!(err, CurveError::NoLiquidity));
    }

    #[test]
    fn test_exact_out_beyond_range_rejected() {
        // cannot extract more B than the range holds (L=1000 at price 1)
        let err = compute_swap(Q64, 1000, 0, true, false, U256::from(10_000u64)).unwrap_err();
        assert!(matches!(err, CurveError::InsufficientLiquidity));
    }

    #[test]
    fn test_invalid_fee_rate() {
        let err = compute_swap(Q64, 1000, FEE_RATE_DENOMINATOR, true, true, U256::from(1u64))
            .unwrap_err();
        assert!(matches!(err, CurveError::InvalidFeeRate(_)));
    }

    #[test]
    fn test_zero_amount_is_identity() {
        let est = compute_swap(Q64, 1000, 2500, true, true, U256::zero()).unwrap();
        assert_eq!(est.amount_out, U256::zero());
        assert_eq!(est.after_sqrt_price, U256::from(Q64));
    }
}
