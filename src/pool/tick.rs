//! Per-tick state and the tick table.
//!
//! A tick is *initialized* iff some position uses it as an endpoint
//! (`liquidity_gross > 0`); only initialized ticks are stored, crossed,
//! or discoverable. The `fee_growth_outside` counters hold the growth
//! accumulated on the side of the tick away from the current price as
//! of the tick's last touch; crossing re-orients them by subtraction
//! from the global counters.

use crate::FastMap;
use crate::error::{Error, PairError, StateError};
use crate::math::liquidity_math::add_delta;
use crate::math::tick_bitmap;
use crate::math::tick_math;
use alloy_primitives::U256;

/// Lowest usable tick for a given spacing.
pub fn min_usable_tick(tick_spacing: i32) -> i32 {
    (tick_math::MIN_TICK / tick_spacing) * tick_spacing
}

/// Highest usable tick for a given spacing.
pub fn max_usable_tick(tick_spacing: i32) -> i32 {
    (tick_math::MAX_TICK / tick_spacing) * tick_spacing
}

/// Cap on `liquidity_gross` per tick such that the sum over every
/// usable tick cannot overflow a u128.
pub fn max_liquidity_per_tick(tick_spacing: i32) -> u128 {
    let num_ticks =
        ((max_usable_tick(tick_spacing) - min_usable_tick(tick_spacing)) / tick_spacing) as u128 + 1;
    u128::MAX / num_ticks
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickInfo {
    /// Total position liquidity referencing this tick as an endpoint.
    pub liquidity_gross: u128,
    /// Net change in in-range liquidity when the price crosses this
    /// tick left to right.
    pub liquidity_net: i128,
    pub fee_growth_outside_0_x128: U256,
    pub fee_growth_outside_1_x128: U256,
    /// Seconds spent on the far side of this tick, same orientation
    /// rules as the fee counters.
    pub seconds_outside: u32,
}

/// All initialized ticks of one pair, plus the bitmap used to discover
/// the next initialized tick in a direction. Any discovery structure
/// that yields the same tick is interchangeable here.
#[derive(Clone, Debug)]
pub struct TickTable {
    tick_spacing: i32,
    max_liquidity_per_tick: u128,
    ticks: FastMap<i32, TickInfo>,
    bitmap: FastMap<i16, U256>,
}

impl TickTable {
    pub fn new(tick_spacing: i32) -> Self {
        Self {
            tick_spacing,
            max_liquidity_per_tick: max_liquidity_per_tick(tick_spacing),
            ticks: FastMap::default(),
            bitmap: FastMap::default(),
        }
    }

    pub fn max_liquidity_per_tick(&self) -> u128 {
        self.max_liquidity_per_tick
    }

    pub fn get(&self, tick: i32) -> Option<&TickInfo> {
        self.ticks.get(&tick)
    }

    pub fn is_initialized(&self, tick: i32) -> bool {
        self.ticks
            .get(&tick)
            .is_some_and(|info| info.liquidity_gross > 0)
    }

    pub fn liquidity_net(&self, tick: i32) -> Option<i128> {
        self.ticks.get(&tick).map(|info| info.liquidity_net)
    }

    /// Checks that applying `liquidity_delta` at `tick` neither over- or
    /// underflows the gross counter nor exceeds the per-tick cap.
    pub fn check_capacity(&self, tick: i32, liquidity_delta: i128) -> Result<(), Error> {
        let gross = self
            .ticks
            .get(&tick)
            .map(|info| info.liquidity_gross)
            .unwrap_or(0);
        let gross_after = add_delta(gross, liquidity_delta)?;
        if gross_after > self.max_liquidity_per_tick {
            return Err(PairError::TickLiquidityOverflow.into());
        }
        Ok(())
    }

    /// Applies a liquidity delta at `tick`, used as an `upper` or lower
    /// range endpoint. On the first initialization of a tick at or
    /// below the current price the outside counters start at the
    /// current globals; above the price they start at zero.
    ///
    /// Returns whether the tick flipped between initialized and
    /// uninitialized.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        tick: i32,
        tick_current: i32,
        liquidity_delta: i128,
        fee_growth_global_0_x128: U256,
        fee_growth_global_1_x128: U256,
        seconds_now: u32,
        upper: bool,
    ) -> Result<bool, Error> {
        if liquidity_delta == 0 && !self.ticks.contains_key(&tick) {
            // a fee-only touch of a tick nobody references stores nothing
            return Ok(false);
        }

        let mut info = self.ticks.get(&tick).cloned().unwrap_or_default();
        let gross_before = info.liquidity_gross;
        let gross_after = add_delta(gross_before, liquidity_delta)?;

        if gross_after > self.max_liquidity_per_tick {
            return Err(PairError::TickLiquidityOverflow.into());
        }

        let flipped = (gross_after == 0) != (gross_before == 0);

        if gross_before == 0 && tick <= tick_current {
            // by convention all growth before a tick existed happened below it
            info.fee_growth_outside_0_x128 = fee_growth_global_0_x128;
            info.fee_growth_outside_1_x128 = fee_growth_global_1_x128;
            info.seconds_outside = seconds_now;
        }

        info.liquidity_gross = gross_after;
        info.liquidity_net = if upper {
            info.liquidity_net - liquidity_delta
        } else {
            info.liquidity_net + liquidity_delta
        };

        self.ticks.insert(tick, info);

        if flipped {
            tick_bitmap::flip_tick(&mut self.bitmap, tick, self.tick_spacing)?;
        }

        Ok(flipped)
    }

    /// Transitions the price across an initialized tick: flips the
    /// outside counters to the other side and returns the liquidity
    /// delta the caller applies to in-range liquidity.
    pub fn cross(
        &mut self,
        tick: i32,
        fee_growth_global_0_x128: U256,
        fee_growth_global_1_x128: U256,
        seconds_now: u32,
    ) -> Result<i128, Error> {
        let info = self
            .ticks
            .get_mut(&tick)
            .ok_or(StateError::TickOutOfBounds)?;
        info.fee_growth_outside_0_x128 =
            fee_growth_global_0_x128.wrapping_sub(info.fee_growth_outside_0_x128);
        info.fee_growth_outside_1_x128 =
            fee_growth_global_1_x128.wrapping_sub(info.fee_growth_outside_1_x128);
        info.seconds_outside = seconds_now.wrapping_sub(info.seconds_outside);
        Ok(info.liquidity_net)
    }

    /// Drops a tick whose last referencing position was burned.
    pub fn clear(&mut self, tick: i32) {
        self.ticks.remove(&tick);
    }

    /// Next initialized tick at or below `tick` (`lte`) or strictly
    /// above, within one bitmap word; an uninitialized result is the
    /// word-boundary tick to continue searching from.
    pub fn next_initialized_tick(&self, tick: i32, lte: bool) -> Result<(i32, bool), Error> {
        tick_bitmap::next_initialized_tick_within_one_word(
            &self.bitmap,
            tick,
            self.tick_spacing,
            lte,
        )
        .map_err(Error::from)
    }

    /// Fee growth accumulated inside `[lower, upper)` per unit of
    /// liquidity, derived from the global counters and the two
    /// endpoint snapshots (all arithmetic modulo 2^256).
    pub fn fee_growth_inside(
        &self,
        lower: i32,
        upper: i32,
        tick_current: i32,
        fee_growth_global_0_x128: U256,
        fee_growth_global_1_x128: U256,
    ) -> (U256, U256) {
        let zero = TickInfo::default();
        let lower_info = self.ticks.get(&lower).unwrap_or(&zero);
        let upper_info = self.ticks.get(&upper).unwrap_or(&zero);

        let (below_0, below_1) = if tick_current >= lower {
            (
                lower_info.fee_growth_outside_0_x128,
                lower_info.fee_growth_outside_1_x128,
            )
        } else {
            (
                fee_growth_global_0_x128.wrapping_sub(lower_info.fee_growth_outside_0_x128),
                fee_growth_global_1_x128.wrapping_sub(lower_info.fee_growth_outside_1_x128),
            )
        };

        let (above_0, above_1) = if tick_current < upper {
            (
                upper_info.fee_growth_outside_0_x128,
                upper_info.fee_growth_outside_1_x128,
            )
        } else {
            (
                fee_growth_global_0_x128.wrapping_sub(upper_info.fee_growth_outside_0_x128),
                fee_growth_global_1_x128.wrapping_sub(upper_info.fee_growth_outside_1_x128),
            )
        };

        (
            fee_growth_global_0_x128
                .wrapping_sub(below_0)
                .wrapping_sub(above_0),
            fee_growth_global_1_x128
                .wrapping_sub(below_1)
                .wrapping_sub(above_1),
        )
    }
}
