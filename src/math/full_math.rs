//! Full-precision 256-bit multiply-divide.
//!
//! Fee-growth counters (Q128.128) deliberately wrap modulo 2^256:
//! callers accumulate with `wrapping_add` and difference two snapshots
//! with `wrapping_sub`, which yields the elapsed growth as long as the
//! two snapshots are taken within one wrap of each other. Only the
//! quotient computations below are checked.

use crate::error::MathError;
use alloy_primitives::U256;

const U256_ONE: U256 = U256::ONE;
const U256_TWO: U256 = U256::from_limbs([2, 0, 0, 0]);
const U256_THREE: U256 = U256::from_limbs([3, 0, 0, 0]);

/// Computes `floor(a * b / denominator)` with full 512-bit intermediate
/// precision. Fails with [`MathError::Overflow`] if the quotient does
/// not fit in 256 bits and [`MathError::DivisionByZero`] on a zero
/// denominator.
#[inline(always)]
pub fn mul_div(a: U256, b: U256, mut denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }

    // 512-bit product as (prod1, prod0) via the mod-2^256-minus-one trick.
    let mm = a.mul_mod(b, U256::MAX);
    let mut prod0 = a.wrapping_mul(b);

    let (mut prod1, borrow) = mm.overflowing_sub(prod0);
    if borrow {
        prod1 = prod1.wrapping_sub(U256_ONE);
    }

    if prod1.is_zero() {
        return Ok(prod0.wrapping_div(denominator));
    }

    if denominator <= prod1 {
        return Err(MathError::Overflow);
    }

    // Subtract the remainder to make the 512-bit value exactly divisible.
    let remainder = a.mul_mod(b, denominator);
    let (prod0_sub, borrow) = prod0.overflowing_sub(remainder);
    prod0 = prod0_sub;
    if borrow {
        prod1 = prod1.wrapping_sub(U256_ONE);
    }

    // Factor powers of two out of the denominator.
    let twos = denominator & denominator.wrapping_neg();
    denominator = denominator.wrapping_div(twos);
    prod0 = prod0.wrapping_div(twos);

    let twos_shift = twos
        .wrapping_neg()
        .wrapping_div(twos)
        .wrapping_add(U256_ONE);
    prod0 |= prod1.wrapping_mul(twos_shift);

    // Modular inverse of the (now odd) denominator by Newton iteration;
    // six steps reach full 256-bit precision.
    let mut inv = U256_THREE.wrapping_mul(denominator) ^ U256_TWO;

    macro_rules! newton_iteration {
        () => {
            inv = inv.wrapping_mul(U256_TWO.wrapping_sub(denominator.wrapping_mul(inv)))
        };
    }

    newton_iteration!();
    newton_iteration!();
    newton_iteration!();
    newton_iteration!();
    newton_iteration!();
    newton_iteration!();

    Ok(prod0.wrapping_mul(inv))
}

/// Like [`mul_div`], rounding the quotient up on a non-zero remainder.
#[inline(always)]
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    let mut result = mul_div(a, b, denominator)?;

    if a.mul_mod(b, denominator) > U256::ZERO {
        if result >= U256::MAX {
            return Err(MathError::Overflow);
        }
        result += U256::ONE;
    }
    Ok(result)
}

/// Divides `a` by `b`, rounding up. Panics on `b == 0`, mirroring
/// primitive integer division; callers must ensure `b != 0`.
#[inline(always)]
pub fn div_rounding_up(a: U256, b: U256) -> U256 {
    let (quotient, remainder) = a.div_rem(b);
    if remainder.is_zero() {
        quotient
    } else {
        quotient + U256::ONE
    }
}

/// Truncates to the low 128 bits, matching the narrowing store used for
/// owed-fee counters.
#[inline(always)]
pub fn low_u128(x: U256) -> u128 {
    let limbs = x.as_limbs();
    ((limbs[1] as u128) << 64) | limbs[0] as u128
}
