//! Per-owner, per-range position accounting.
//!
//! A position's owed fees are a pure function of the liquidity deltas
//! applied to it and the inside-growth snapshots observed at each
//! touch: every update settles the growth since the last snapshot into
//! `fees_owed_*` before the liquidity changes.

use crate::FastMap;
use crate::Q128;
use crate::error::{Error, PairError};
use crate::math::full_math::{low_u128, mul_div};
use crate::math::liquidity_math::add_delta;
use alloy_primitives::{Address, U256};

pub type PositionKey = (Address, i32, i32);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Position {
    pub liquidity: u128,
    pub fee_growth_inside_0_last_x128: U256,
    pub fee_growth_inside_1_last_x128: U256,
    pub fees_owed_0: u128,
    pub fees_owed_1: u128,
}

#[derive(Clone, Debug, Default)]
pub struct PositionLedger {
    positions: FastMap<PositionKey, Position>,
}

impl PositionLedger {
    pub fn get(&self, owner: Address, lower: i32, upper: i32) -> Option<&Position> {
        self.positions.get(&(owner, lower, upper))
    }

    pub fn liquidity_of(&self, owner: Address, lower: i32, upper: i32) -> u128 {
        self.get(owner, lower, upper)
            .map(|p| p.liquidity)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Settles accrued fees against the new inside-growth snapshots and
    /// applies the liquidity delta.
    ///
    /// Positions are created lazily, only when liquidity is being
    /// added; a fee-only touch (`liquidity_delta == 0`) of a position
    /// that does not exist or holds no liquidity is an error.
    pub fn update(
        &mut self,
        owner: Address,
        lower: i32,
        upper: i32,
        liquidity_delta: i128,
        fee_growth_inside_0_x128: U256,
        fee_growth_inside_1_x128: U256,
    ) -> Result<(), Error> {
        let key = (owner, lower, upper);

        if !self.positions.contains_key(&key) {
            if liquidity_delta <= 0 {
                return Err(PairError::NoPosition.into());
            }
            self.positions.insert(key, Position::default());
        }
        let pos = self
            .positions
            .get_mut(&key)
            .ok_or(PairError::NoPosition)?;

        if liquidity_delta == 0 && pos.liquidity == 0 {
            return Err(PairError::NoPosition.into());
        }

        let liquidity_next = add_delta(pos.liquidity, liquidity_delta)?;

        // settle fees on the liquidity that was in place up to now;
        // snapshot differences are modular by construction
        let owed_0 = mul_div(
            fee_growth_inside_0_x128.wrapping_sub(pos.fee_growth_inside_0_last_x128),
            U256::from(pos.liquidity),
            Q128,
        )?;
        let owed_1 = mul_div(
            fee_growth_inside_1_x128.wrapping_sub(pos.fee_growth_inside_1_last_x128),
            U256::from(pos.liquidity),
            Q128,
        )?;
        pos.fees_owed_0 = pos.fees_owed_0.wrapping_add(low_u128(owed_0));
        pos.fees_owed_1 = pos.fees_owed_1.wrapping_add(low_u128(owed_1));

        pos.fee_growth_inside_0_last_x128 = fee_growth_inside_0_x128;
        pos.fee_growth_inside_1_last_x128 = fee_growth_inside_1_x128;

        let had_liquidity = pos.liquidity > 0;
        pos.liquidity = liquidity_next;

        if liquidity_next == 0 && had_liquidity {
            pos.fee_growth_inside_0_last_x128 = U256::ZERO;
            pos.fee_growth_inside_1_last_x128 = U256::ZERO;
        }

        Ok(())
    }

    /// Credits burned principal into the owed counters; paid out later
    /// by `collect`.
    pub fn credit(&mut self, owner: Address, lower: i32, upper: i32, amount0: u128, amount1: u128) {
        if let Some(pos) = self.positions.get_mut(&(owner, lower, upper)) {
            pos.fees_owed_0 = pos.fees_owed_0.wrapping_add(amount0);
            pos.fees_owed_1 = pos.fees_owed_1.wrapping_add(amount1);
        }
    }

    /// Removes up to `(max0, max1)` from the owed counters, returning
    /// what was actually taken.
    pub fn take_owed(
        &mut self,
        owner: Address,
        lower: i32,
        upper: i32,
        max0: u128,
        max1: u128,
    ) -> Result<(u128, u128), Error> {
        let pos = self
            .positions
            .get_mut(&(owner, lower, upper))
            .ok_or(PairError::NoPosition)?;
        let amount0 = max0.min(pos.fees_owed_0);
        let amount1 = max1.min(pos.fees_owed_1);
        pos.fees_owed_0 -= amount0;
        pos.fees_owed_1 -= amount1;
        Ok((amount0, amount1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Address {
        Address::with_last_byte(0xaa)
    }

    fn q128(units: u64) -> U256 {
        // `units` whole tokens of growth per unit of liquidity
        U256::from(units) << 128
    }

    #[test]
    fn poke_of_missing_position_fails() {
        let mut ledger = PositionLedger::default();
        let result = ledger.update(owner(), -60, 60, 0, U256::ZERO, U256::ZERO);
        assert!(matches!(result, Err(Error::Pair(PairError::NoPosition))));
        assert!(ledger.is_empty());
    }

    #[test]
    fn burn_against_missing_position_fails() {
        let mut ledger = PositionLedger::default();
        let result = ledger.update(owner(), -60, 60, -5, U256::ZERO, U256::ZERO);
        assert!(matches!(result, Err(Error::Pair(PairError::NoPosition))));
    }

    #[test]
    fn mint_creates_lazily_and_tracks_liquidity() {
        let mut ledger = PositionLedger::default();
        ledger
            .update(owner(), -60, 60, 1000, U256::ZERO, U256::ZERO)
            .unwrap();
        assert_eq!(ledger.liquidity_of(owner(), -60, 60), 1000);
        assert_eq!(ledger.len(), 1);

        ledger
            .update(owner(), -60, 60, 500, U256::ZERO, U256::ZERO)
            .unwrap();
        assert_eq!(ledger.liquidity_of(owner(), -60, 60), 1500);
    }

    #[test]
    fn fees_settle_on_every_touch() {
        let mut ledger = PositionLedger::default();
        ledger
            .update(owner(), -60, 60, 1000, U256::ZERO, U256::ZERO)
            .unwrap();

        // 3 tokens of growth per unit of liquidity on token0
        ledger
            .update(owner(), -60, 60, 0, q128(3), U256::ZERO)
            .unwrap();
        let pos = ledger.get(owner(), -60, 60).unwrap();
        assert_eq!(pos.fees_owed_0, 3000);
        assert_eq!(pos.fees_owed_1, 0);
        assert_eq!(pos.fee_growth_inside_0_last_x128, q128(3));

        // repeated poke with the same snapshot adds nothing
        ledger
            .update(owner(), -60, 60, 0, q128(3), U256::ZERO)
            .unwrap();
        assert_eq!(ledger.get(owner(), -60, 60).unwrap().fees_owed_0, 3000);
    }

    #[test]
    fn fees_use_pre_update_liquidity() {
        let mut ledger = PositionLedger::default();
        ledger
            .update(owner(), -60, 60, 1000, U256::ZERO, U256::ZERO)
            .unwrap();
        // growth arrives together with a liquidity increase: only the
        // old 1000 units earn it
        ledger
            .update(owner(), -60, 60, 9000, q128(1), U256::ZERO)
            .unwrap();
        let pos = ledger.get(owner(), -60, 60).unwrap();
        assert_eq!(pos.fees_owed_0, 1000);
        assert_eq!(pos.liquidity, 10_000);
    }

    #[test]
    fn wrapped_snapshots_still_difference_correctly() {
        let mut ledger = PositionLedger::default();
        ledger
            .update(owner(), -60, 60, 1000, U256::MAX - q128(1) + U256::ONE, U256::ZERO)
            .unwrap();
        // global wrapped past zero; two units of growth elapsed
        ledger
            .update(owner(), -60, 60, 0, q128(1), U256::ZERO)
            .unwrap();
        assert_eq!(ledger.get(owner(), -60, 60).unwrap().fees_owed_0, 2000);
    }

    #[test]
    fn full_exit_zeroes_snapshots_but_keeps_owed() {
        let mut ledger = PositionLedger::default();
        ledger
            .update(owner(), -60, 60, 1000, U256::ZERO, U256::ZERO)
            .unwrap();
        ledger
            .update(owner(), -60, 60, -1000, q128(2), U256::ZERO)
            .unwrap();

        let pos = ledger.get(owner(), -60, 60).unwrap();
        assert_eq!(pos.liquidity, 0);
        assert_eq!(pos.fees_owed_0, 2000);
        assert_eq!(pos.fee_growth_inside_0_last_x128, U256::ZERO);

        // empty again: a further poke is an error
        let result = ledger.update(owner(), -60, 60, 0, q128(2), U256::ZERO);
        assert!(matches!(result, Err(Error::Pair(PairError::NoPosition))));
    }

    #[test]
    fn take_owed_respects_maxima() {
        let mut ledger = PositionLedger::default();
        ledger
            .update(owner(), -60, 60, 1000, U256::ZERO, U256::ZERO)
            .unwrap();
        ledger.credit(owner(), -60, 60, 300, 40);

        let (a0, a1) = ledger.take_owed(owner(), -60, 60, 100, u128::MAX).unwrap();
        assert_eq!((a0, a1), (100, 40));
        let pos = ledger.get(owner(), -60, 60).unwrap();
        assert_eq!((pos.fees_owed_0, pos.fees_owed_1), (200, 0));
    }

    #[test]
    fn take_owed_of_missing_position_fails() {
        let mut ledger = PositionLedger::default();
        assert!(matches!(
            ledger.take_owed(owner(), -60, 60, 1, 1),
            Err(Error::Pair(PairError::NoPosition))
        ));
    }

    #[test]
    fn distinct_ranges_are_distinct_positions() {
        let mut ledger = PositionLedger::default();
        ledger
            .update(owner(), -60, 60, 10, U256::ZERO, U256::ZERO)
            .unwrap();
        ledger
            .update(owner(), -60, 120, 20, U256::ZERO, U256::ZERO)
            .unwrap();
        assert_eq!(ledger.liquidity_of(owner(), -60, 60), 10);
        assert_eq!(ledger.liquidity_of(owner(), -60, 120), 20);
        assert_eq!(ledger.len(), 2);
    }
}
