//! One step of a swap: how far the price moves between two bounds at
//! fixed liquidity, how much goes in, how much comes out, and the fee.

use crate::FEE_PIPS_DENOMINATOR;
use crate::error::Error;
use crate::math::full_math::{mul_div, mul_div_rounding_up};
use crate::math::sqrt_price_math::{
    get_amount_0_delta_unsigned, get_amount_1_delta_unsigned, get_next_sqrt_price_from_input,
    get_next_sqrt_price_from_output,
};
use alloy_primitives::{I256, U256};

/// Computes a single swap step from `sqrt_ratio_current_x96` toward
/// `sqrt_ratio_target_x96`. The direction is implied by the ordering of
/// the two prices; `amount_remaining >= 0` means exact input (fee comes
/// out of it), negative means exact output.
///
/// Returns `(sqrt_ratio_next, amount_in, amount_out, fee_amount)`.
/// When the target is reached the fee is charged on the exact required
/// input, rounded up; when the input is exhausted first, the fee is
/// whatever remains after the curve input.
pub fn compute_swap_step(
    sqrt_ratio_current_x96: U256,
    sqrt_ratio_target_x96: U256,
    liquidity: u128,
    amount_remaining: I256,
    fee_pips: u32,
) -> Result<(U256, U256, U256, U256), Error> {
    let zero_for_one = sqrt_ratio_current_x96 >= sqrt_ratio_target_x96;
    let exact_in = !amount_remaining.is_negative();

    let fee_pips = U256::from(fee_pips);
    let fee_denominator = U256::from(FEE_PIPS_DENOMINATOR);

    let sqrt_ratio_next_x96: U256;
    let mut amount_in = U256::ZERO;
    let mut amount_out = U256::ZERO;

    if exact_in {
        let amount_remaining_less_fee = mul_div(
            amount_remaining.into_raw(),
            fee_denominator - fee_pips,
            fee_denominator,
        )?;
        amount_in = if zero_for_one {
            get_amount_0_delta_unsigned(
                sqrt_ratio_target_x96,
                sqrt_ratio_current_x96,
                liquidity,
                true,
            )?
        } else {
            get_amount_1_delta_unsigned(
                sqrt_ratio_current_x96,
                sqrt_ratio_target_x96,
                liquidity,
                true,
            )?
        };
        sqrt_ratio_next_x96 = if amount_remaining_less_fee >= amount_in {
            sqrt_ratio_target_x96
        } else {
            get_next_sqrt_price_from_input(
                sqrt_ratio_current_x96,
                liquidity,
                amount_remaining_less_fee,
                zero_for_one,
            )?
        };
    } else {
        amount_out = if zero_for_one {
            get_amount_1_delta_unsigned(
                sqrt_ratio_target_x96,
                sqrt_ratio_current_x96,
                liquidity,
                false,
            )?
        } else {
            get_amount_0_delta_unsigned(
                sqrt_ratio_current_x96,
                sqrt_ratio_target_x96,
                liquidity,
                false,
            )?
        };
        sqrt_ratio_next_x96 = if amount_remaining.unsigned_abs() >= amount_out {
            sqrt_ratio_target_x96
        } else {
            get_next_sqrt_price_from_output(
                sqrt_ratio_current_x96,
                liquidity,
                amount_remaining.unsigned_abs(),
                zero_for_one,
            )?
        };
    }

    let reached_target = sqrt_ratio_target_x96 == sqrt_ratio_next_x96;

    // Recompute whichever leg was not fixed above against the actual
    // end price of the step.
    if zero_for_one {
        if !(reached_target && exact_in) {
            amount_in = get_amount_0_delta_unsigned(
                sqrt_ratio_next_x96,
                sqrt_ratio_current_x96,
                liquidity,
                true,
            )?;
        }
        if !(reached_target && !exact_in) {
            amount_out = get_amount_1_delta_unsigned(
                sqrt_ratio_next_x96,
                sqrt_ratio_current_x96,
                liquidity,
                false,
            )?;
        }
    } else {
        if !(reached_target && exact_in) {
            amount_in = get_amount_1_delta_unsigned(
                sqrt_ratio_current_x96,
                sqrt_ratio_next_x96,
                liquidity,
                true,
            )?;
        }
        if !(reached_target && !exact_in) {
            amount_out = get_amount_0_delta_unsigned(
                sqrt_ratio_current_x96,
                sqrt_ratio_next_x96,
                liquidity,
                false,
            )?;
        }
    }

    // The payout never exceeds what was asked for.
    if !exact_in && amount_out > amount_remaining.unsigned_abs() {
        amount_out = amount_remaining.unsigned_abs();
    }

    let fee_amount = if exact_in && sqrt_ratio_next_x96 != sqrt_ratio_target_x96 {
        // input exhausted inside the tick: the leftover is the fee
        amount_remaining.into_raw() - amount_in
    } else {
        mul_div_rounding_up(amount_in, fee_pips, fee_denominator - fee_pips)?
    };

    Ok((sqrt_ratio_next_x96, amount_in, amount_out, fee_amount))
}
