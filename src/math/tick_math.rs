//! The bijection between integer tick indices and Q64.96 sqrt prices.
//!
//! A tick `i` denotes the price `1.0001^i`, so the sqrt price is
//! `1.0001^(i/2)`. Both directions are exact integer routines whose
//! outputs are locked to the reference vectors in the tests below;
//! a conforming change must keep them bit-identical.

use crate::error::StateError;
use crate::{U256_127, U256_128};
use alloy_primitives::{I256, U256};

/// Lowest representable tick; `1.0001^MIN_TICK` is on the order of 2^-128.
pub const MIN_TICK: i32 = -887272;
/// Highest representable tick.
pub const MAX_TICK: i32 = -MIN_TICK;

/// `get_sqrt_ratio_at_tick(MIN_TICK)`.
pub const MIN_SQRT_RATIO: U256 = U256::from_limbs([4295128739, 0, 0, 0]);
/// `get_sqrt_ratio_at_tick(MAX_TICK) + 1`; valid sqrt prices are below this.
pub const MAX_SQRT_RATIO: U256 =
    U256::from_limbs([6743328256752651558, 17280870778742802505, 4294805859, 0]);

const SQRT_10001: I256 = I256::from_raw(U256::from_limbs([11745905768312294533, 13863, 0, 0]));
const TICK_LOW: I256 = I256::from_raw(U256::from_limbs([
    6552757943157144234,
    184476617836266586,
    0,
    0,
]));
const TICK_HIGH: I256 = I256::from_raw(U256::from_limbs([
    4998474450511881007,
    15793544031827761793,
    0,
    0,
]));

/// Returns the Q64.96 sqrt price at a tick, or
/// [`StateError::TickOutOfBounds`] outside `[MIN_TICK, MAX_TICK]`.
///
/// Piecewise exponentiation over the binary expansion of `|tick|`:
/// each set bit multiplies in a precomputed Q128.128 power of
/// `1 / sqrt(1.0001)`, and positive ticks take the reciprocal at the end.
pub fn get_sqrt_ratio_at_tick(tick: i32) -> Result<U256, StateError> {
    let abs_tick = tick.unsigned_abs();

    if abs_tick > MAX_TICK as u32 {
        return Err(StateError::TickOutOfBounds);
    }

    let mut ratio = if abs_tick & 1 != 0 {
        U256::from_limbs([12262481743371124737, 18445821805675392311, 0, 0])
    } else {
        U256::from_limbs([0, 0, 1, 0])
    };

    macro_rules! mul_bit {
        ($bit:expr, $l0:expr, $l1:expr) => {
            if abs_tick & $bit != 0 {
                ratio = ratio.wrapping_mul(U256::from_limbs([$l0, $l1, 0, 0])) >> 128;
            }
        };
    }

    mul_bit!(2, 6459403834229662010, 18444899583751176498);
    mul_bit!(4, 17226890335427755468, 18443055278223354162);
    mul_bit!(8, 2032852871939366096, 18439367220385604838);
    mul_bit!(16, 14545316742740207172, 18431993317065449817);
    mul_bit!(32, 5129152022828963008, 18417254355718160513);
    mul_bit!(64, 4894419605888772193, 18387811781193591352);
    mul_bit!(128, 1280255884321894483, 18329067761203520168);
    mul_bit!(256, 15924666964335305636, 18212142134806087854);
    mul_bit!(512, 8010504389359918676, 17980523815641551639);
    mul_bit!(1024, 10668036004952895731, 17526086738831147013);
    mul_bit!(2048, 4878133418470705625, 16651378430235024244);
    mul_bit!(4096, 9537173718739605541, 15030750278693429944);
    mul_bit!(8192, 9972618978014552549, 12247334978882834399);
    mul_bit!(16384, 10428997489610666743, 8131365268884726200);
    mul_bit!(32768, 9305304367709015974, 3584323654723342297);
    mul_bit!(65536, 14301143598189091785, 696457651847595233);
    mul_bit!(131072, 7393154844743099908, 26294789957452057);
    mul_bit!(262144, 2209338891292245656, 37481735321082);
    mul_bit!(524288, 10518117631919034274, 76158723);

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128.128 -> Q64.96, rounding up so the inverse mapping stays exact.
    let round_up = (ratio.as_limbs()[0] & 0xFFFF_FFFF) != 0;
    Ok((ratio >> 32) + U256::from(round_up as u64))
}

const MASK_128: U256 = U256::from_limbs([u64::MAX, u64::MAX, 0, 0]);
const MASK_64: U256 = U256::from_limbs([u64::MAX, 0, 0, 0]);
const MASK_32: U256 = U256::from_limbs([u32::MAX as u64, 0, 0, 0]);
const MASK_16: U256 = U256::from_limbs([u16::MAX as u64, 0, 0, 0]);

#[inline(always)]
fn most_significant_bit_of_ratio(mut r: U256) -> u32 {
    let mut msb: u32 = 0;

    if r > MASK_128 {
        msb |= 128;
        r >>= 128;
    }
    if r > MASK_64 {
        msb |= 64;
        r >>= 64;
    }
    if r > MASK_32 {
        msb |= 32;
        r >>= 32;
    }
    if r > MASK_16 {
        msb |= 16;
        r >>= 16;
    }
    if r > U256::from(255u64) {
        msb |= 8;
        r >>= 8;
    }
    if r > U256::from(15u64) {
        msb |= 4;
        r >>= 4;
    }
    if r > U256::from(3u64) {
        msb |= 2;
        r >>= 2;
    }
    if r > U256::ONE {
        msb |= 1;
    }

    msb
}

/// Returns the largest tick whose sqrt ratio is at most the given Q64.96
/// price, or [`StateError::SqrtPriceOutOfBounds`] outside
/// `[MIN_SQRT_RATIO, MAX_SQRT_RATIO)`.
///
/// Computes a fixed-point base-2 log of the price, rescales to the
/// `sqrt(1.0001)` base, and resolves the one-tick ambiguity by checking
/// the candidate against [`get_sqrt_ratio_at_tick`].
pub fn get_tick_at_sqrt_ratio(sqrt_price_x96: U256) -> Result<i32, StateError> {
    if sqrt_price_x96 < MIN_SQRT_RATIO || sqrt_price_x96 >= MAX_SQRT_RATIO {
        return Err(StateError::SqrtPriceOutOfBounds);
    }

    let ratio = sqrt_price_x96 << 32;
    let msb = most_significant_bit_of_ratio(ratio);

    let mut r = if msb >= 128 {
        ratio >> (msb - 127)
    } else {
        ratio << (127 - msb)
    };

    let mut log_2: I256 = (I256::from_raw(U256::from(msb)) - I256::from_raw(U256_128)) << 64;

    macro_rules! log2_step {
        ($shift:expr) => {{
            r = r.overflowing_mul(r).0 >> U256_127;
            let f = r >> 128;
            log_2 |= I256::from_raw(f << $shift);
            r >>= f;
        }};
    }

    log2_step!(63);
    log2_step!(62);
    log2_step!(61);
    log2_step!(60);
    log2_step!(59);
    log2_step!(58);
    log2_step!(57);
    log2_step!(56);
    log2_step!(55);
    log2_step!(54);
    log2_step!(53);
    log2_step!(52);
    log2_step!(51);
    log2_step!(50);

    let log_sqrt10001 = log_2.wrapping_mul(SQRT_10001);
    let tick_low = ((log_sqrt10001 - TICK_LOW) >> 128usize).low_i32();
    let tick_high = ((log_sqrt10001 + TICK_HIGH) >> 128usize).low_i32();

    Ok(if tick_low == tick_high {
        tick_low
    } else if get_sqrt_ratio_at_tick(tick_high)? <= sqrt_price_x96 {
        tick_high
    } else {
        tick_low
    })
}
