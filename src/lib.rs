//! Concentrated-liquidity pair engine.
//!
//! A single [`pool::pair::PairEngine`] holds the whole state of one
//! token0/token1 pair: the hot `Slot0` (sqrt price, tick, oracle
//! accumulator), in-range liquidity, Q128.128 fee-growth counters, the
//! tick table, and the position ledger. Liquidity providers mint and burn
//! liquidity over `[lower, upper)` tick ranges; swappers move the price
//! along the constant-function curve, crossing initialized ticks as they
//! go. All price arithmetic is exact Q64.96 integer math on
//! [`alloy_primitives::U256`].

use alloy_primitives::U256;

pub mod error;
mod hash;
pub mod math;
pub mod pool;

pub use hash::FastMap;
pub use pool::pair::{ManualClock, PairEngine};

pub(crate) const U256_1: U256 = U256::from_limbs([1, 0, 0, 0]);
pub(crate) const U256_127: U256 = U256::from_limbs([127, 0, 0, 0]);
pub(crate) const U256_128: U256 = U256::from_limbs([128, 0, 0, 0]);

pub(crate) const U160_MAX: U256 = U256::from_limbs([0, 0, 4294967296, 0]);
pub(crate) const U256_10000: U256 = U256::from_limbs([10000, 0, 0, 0]);

/// Number of fractional bits in a Q64.96 sqrt price.
pub const RESOLUTION: u8 = 96;
/// 2^96, the Q64.96 one.
pub const Q96: U256 = U256::from_limbs([0, 4294967296, 0, 0]);
/// 2^128, the Q128.128 one; fee growth is denominated in this.
pub const Q128: U256 = U256::from_limbs([0, 0, 1, 0]);

/// Fee denominator: fees are quoted in hundredths of a bip.
pub const FEE_PIPS_DENOMINATOR: u32 = 1_000_000;
