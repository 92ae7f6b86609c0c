//! The pair engine: one instance owns the complete state of a
//! token0/token1 pair and is the only component that mutates it.
//!
//! Every public mutator is a transaction. Validation, capacity checks,
//! amount computation, and token debits all happen before the first
//! write to the books; paired token transfers are balance-checked
//! before either leg moves, so a second-leg failure never strands the
//! first; the swap loop computes into a local state and defers tick
//! crossings until after the payment check. A failed call leaves the
//! engine exactly as it was.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use alloy_primitives::{Address, I256, U256};

use crate::error::{Error, PairError, StateError, TokenError};
use crate::math::full_math::{low_u128, mul_div};
use crate::math::liquidity_math::add_delta;
use crate::math::swap_math::compute_swap_step;
use crate::math::sqrt_price_math::{get_amount_0_delta, get_amount_1_delta};
use crate::math::tick_math::{
    MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO, MIN_TICK, get_sqrt_ratio_at_tick,
    get_tick_at_sqrt_ratio,
};
use crate::pool::events::Event;
use crate::pool::position::{Position, PositionLedger};
use crate::pool::tick::{TickInfo, TickTable, max_usable_tick, min_usable_tick};
use crate::pool::token::{SwapCallback, Token};
use crate::{Q128, U256_1, U256_10000};

/// Protocol fee denominator: one sixth of the swap fee while enabled.
const PROTOCOL_FEE_SHARE: u8 = 6;

/// Settable seconds source shared between the engine and its tests.
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Arc<AtomicU32>);

impl ManualClock {
    pub fn new(start: u32) -> Self {
        Self(Arc::new(AtomicU32::new(start)))
    }

    pub fn now(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, t: u32) {
        self.0.store(t, Ordering::Relaxed)
    }

    pub fn advance(&self, dt: u32) {
        self.0.fetch_add(dt, Ordering::Relaxed);
    }
}

/// Hot state read by every operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Slot0 {
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub block_timestamp_last: u32,
    /// Time-weighted tick accumulator, wrapping in 56 bits.
    pub tick_cumulative_last: i64,
    /// Re-entrancy guard; false until `initialize` and while a
    /// mutating call is in flight.
    pub unlocked: bool,
}

/// Result of a read-only swap simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuoteResult {
    pub amount0_delta: I256,
    pub amount1_delta: I256,
    pub fees_paid: U256,
}

/// Conservative sqrt-price limit for a swap from a tolerance in basis
/// points, for callers that think in slippage rather than prices.
pub fn calculate_sqrt_price_limit(
    sqrt_price_x96: U256,
    zero_for_one: bool,
    tolerance_bps: u32,
) -> U256 {
    let bps = U256::from(tolerance_bps);
    if zero_for_one {
        sqrt_price_x96 * (U256_10000 - bps) / U256_10000
    } else {
        sqrt_price_x96 * (U256_10000 + bps) / U256_10000
    }
}

// the top level state of the swap, the results of which are recorded
// at commit time
struct SwapState {
    // the amount remaining to be swapped in/out of the input/output asset
    amount_specified_remaining: I256,
    // the amount already swapped out/in of the output/input asset
    amount_calculated: I256,
    // current sqrt(price)
    sqrt_price_x96: U256,
    // the tick associated with the current price
    tick: i32,
    // the current liquidity in range
    liquidity: u128,
    // global fee growth of the input token, carried in-flight
    fee_growth_global_x128: U256,
    // protocol fee accumulated during the swap, in token units
    protocol_fee: u128,
    // total fee charged, all recipients combined
    swap_fee: U256,
}

// a boundary the price travelled through; applied to the tick table at
// commit with the growth values seen at the moment of crossing
struct Crossing {
    tick: i32,
    fee_growth_global_0_x128: U256,
    fee_growth_global_1_x128: U256,
}

fn wrap_i56(x: i64) -> i64 {
    (x << 8) >> 8
}

pub struct PairEngine<T: Token> {
    address: Address,
    owner: Address,
    token0: T,
    token1: T,
    /// Swap fee in hundredths of a bip.
    fee: u32,
    tick_spacing: i32,
    min_tick: i32,
    max_tick: i32,
    slot0: Slot0,
    liquidity: u128,
    fee_growth_global_0_x128: U256,
    fee_growth_global_1_x128: U256,
    fee_to: Option<Address>,
    fee_to_fees_0: u128,
    fee_to_fees_1: u128,
    ticks: TickTable,
    positions: PositionLedger,
    clock: ManualClock,
    events: Vec<Event>,
}

impl<T: Token> PairEngine<T> {
    pub fn new(
        address: Address,
        owner: Address,
        token0: T,
        token1: T,
        fee: u32,
        tick_spacing: i32,
        clock: ManualClock,
    ) -> Result<Self, Error> {
        if tick_spacing < 1 {
            return Err(PairError::TickSpacing.into());
        }
        Ok(Self {
            address,
            owner,
            token0,
            token1,
            fee,
            tick_spacing,
            min_tick: min_usable_tick(tick_spacing),
            max_tick: max_usable_tick(tick_spacing),
            slot0: Slot0::default(),
            liquidity: 0,
            fee_growth_global_0_x128: U256::ZERO,
            fee_growth_global_1_x128: U256::ZERO,
            fee_to: None,
            fee_to_fees_0: 0,
            fee_to_fees_1: 0,
            ticks: TickTable::new(tick_spacing),
            positions: PositionLedger::default(),
            clock,
            events: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // views
    // ------------------------------------------------------------------

    pub fn slot0(&self) -> Slot0 {
        self.slot0
    }

    pub fn liquidity(&self) -> u128 {
        self.liquidity
    }

    pub fn fee_growth_globals(&self) -> (U256, U256) {
        (self.fee_growth_global_0_x128, self.fee_growth_global_1_x128)
    }

    pub fn protocol_fees(&self) -> (u128, u128) {
        (self.fee_to_fees_0, self.fee_to_fees_1)
    }

    pub fn fee_to(&self) -> Option<Address> {
        self.fee_to
    }

    pub fn min_tick(&self) -> i32 {
        self.min_tick
    }

    pub fn max_tick(&self) -> i32 {
        self.max_tick
    }

    pub fn max_liquidity_per_tick(&self) -> u128 {
        self.ticks.max_liquidity_per_tick()
    }

    pub fn tick(&self, tick: i32) -> Option<&TickInfo> {
        self.ticks.get(tick)
    }

    pub fn position(&self, owner: Address, lower: i32, upper: i32) -> Option<&Position> {
        self.positions.get(owner, lower, upper)
    }

    pub fn token0(&self) -> &T {
        &self.token0
    }

    pub fn token1(&self) -> &T {
        &self.token1
    }

    pub fn token0_mut(&mut self) -> &mut T {
        &mut self.token0
    }

    pub fn token1_mut(&mut self) -> &mut T {
        &mut self.token1
    }

    /// Time-weighted tick accumulator extrapolated to now, wrapping in
    /// 56 bits.
    pub fn tick_cumulative(&self) -> i64 {
        let elapsed = self.clock.now().wrapping_sub(self.slot0.block_timestamp_last) as i64;
        wrap_i56(
            self.slot0
                .tick_cumulative_last
                .wrapping_add((self.slot0.tick as i64).wrapping_mul(elapsed)),
        )
    }

    /// Drains the recorded events.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------
    // lifecycle
    // ------------------------------------------------------------------

    /// Sets the starting price and mints the one-wei full-range dead
    /// position so in-range liquidity can never reach zero. Debits the
    /// cost of that unit from `sender`.
    pub fn initialize(&mut self, sender: Address, sqrt_price_x96: U256) -> Result<(), Error> {
        if !self.slot0.sqrt_price_x96.is_zero() {
            return Err(PairError::AlreadyInitialized.into());
        }

        let tick = get_tick_at_sqrt_ratio(sqrt_price_x96)?;
        if sqrt_price_x96 < get_sqrt_ratio_at_tick(self.min_tick)? {
            return Err(PairError::PriceBelowRange.into());
        }
        if sqrt_price_x96 >= get_sqrt_ratio_at_tick(self.max_tick)? {
            return Err(PairError::PriceAboveRange.into());
        }

        let (amount0, amount1) =
            self.amounts_for_delta_at(tick, sqrt_price_x96, self.min_tick, self.max_tick, 1)?;

        Self::ensure_funds(&self.token0, sender, amount0.unsigned_abs())?;
        Self::ensure_funds(&self.token1, sender, amount1.unsigned_abs())?;
        self.token0
            .transfer_from(sender, self.address, amount0.unsigned_abs())?;
        self.token1
            .transfer_from(sender, self.address, amount1.unsigned_abs())?;

        let now = self.clock.now();
        self.slot0 = Slot0 {
            sqrt_price_x96,
            tick,
            block_timestamp_last: now,
            tick_cumulative_last: 0,
            unlocked: false,
        };
        self.apply_position_update(Address::ZERO, self.min_tick, self.max_tick, 1, now)?;
        self.slot0.unlocked = true;

        self.events.push(Event::Initialized { sqrt_price_x96, tick });
        Ok(())
    }

    // ------------------------------------------------------------------
    // liquidity provision
    // ------------------------------------------------------------------

    /// Adds `amount` liquidity to `(owner, lower, upper)`, debiting the
    /// required token amounts from `sender`. `amount == 0` is a poke:
    /// it refreshes the position's fee snapshots and requires the
    /// position to exist.
    pub fn mint(
        &mut self,
        sender: Address,
        owner: Address,
        lower: i32,
        upper: i32,
        amount: u128,
    ) -> Result<(U256, U256), Error> {
        self.lock()?;
        let result = self.mint_locked(sender, owner, lower, upper, amount);
        self.unlock();
        result
    }

    fn mint_locked(
        &mut self,
        sender: Address,
        owner: Address,
        lower: i32,
        upper: i32,
        amount: u128,
    ) -> Result<(U256, U256), Error> {
        self.check_ticks(lower, upper)?;
        let delta = i128::try_from(amount).map_err(|_| crate::error::LiquidityError::Overflow)?;

        if delta == 0 && self.positions.liquidity_of(owner, lower, upper) == 0 {
            return Err(PairError::NoPosition.into());
        }

        // everything that can fail is checked before the debit
        self.ticks.check_capacity(lower, delta)?;
        self.ticks.check_capacity(upper, delta)?;
        if self.slot0.tick >= lower && self.slot0.tick < upper {
            add_delta(self.liquidity, delta)?;
        }

        let (amount0, amount1) = self.amounts_for_liquidity_delta(lower, upper, delta)?;

        Self::ensure_funds(&self.token0, sender, amount0.unsigned_abs())?;
        Self::ensure_funds(&self.token1, sender, amount1.unsigned_abs())?;
        if amount0 > I256::ZERO {
            self.token0
                .transfer_from(sender, self.address, amount0.unsigned_abs())?;
        }
        if amount1 > I256::ZERO {
            self.token1
                .transfer_from(sender, self.address, amount1.unsigned_abs())?;
        }

        let now = self.clock.now();
        self.apply_position_update(owner, lower, upper, delta, now)?;

        self.events.push(Event::Mint {
            sender,
            owner,
            tick_lower: lower,
            tick_upper: upper,
            amount,
            amount0: amount0.unsigned_abs(),
            amount1: amount1.unsigned_abs(),
        });
        Ok((amount0.unsigned_abs(), amount1.unsigned_abs()))
    }

    /// Removes `amount` liquidity from the caller's position. Tokens
    /// are not transferred: the principal is credited to the position's
    /// owed counters and paid out by [`PairEngine::collect`].
    pub fn burn(
        &mut self,
        owner: Address,
        lower: i32,
        upper: i32,
        amount: u128,
    ) -> Result<(U256, U256), Error> {
        self.lock()?;
        let result = self.burn_locked(owner, lower, upper, amount);
        self.unlock();
        result
    }

    fn burn_locked(
        &mut self,
        owner: Address,
        lower: i32,
        upper: i32,
        amount: u128,
    ) -> Result<(U256, U256), Error> {
        self.check_ticks(lower, upper)?;

        if amount > 0 && amount > self.positions.liquidity_of(owner, lower, upper) {
            return Err(PairError::BurnExceedsPosition.into());
        }
        let delta = -i128::try_from(amount).map_err(|_| crate::error::LiquidityError::Overflow)?;

        let (amount0, amount1) = self.amounts_for_liquidity_delta(lower, upper, delta)?;

        let now = self.clock.now();
        self.apply_position_update(owner, lower, upper, delta, now)?;
        self.positions.credit(
            owner,
            lower,
            upper,
            low_u128(amount0.unsigned_abs()),
            low_u128(amount1.unsigned_abs()),
        );

        self.events.push(Event::Burn {
            owner,
            tick_lower: lower,
            tick_upper: upper,
            amount,
            amount0: amount0.unsigned_abs(),
            amount1: amount1.unsigned_abs(),
        });
        Ok((amount0.unsigned_abs(), amount1.unsigned_abs()))
    }

    /// Pays out up to `(max0, max1)` of the caller's accumulated fees
    /// and burned principal to `recipient`.
    pub fn collect(
        &mut self,
        sender: Address,
        lower: i32,
        upper: i32,
        recipient: Address,
        max0: u128,
        max1: u128,
    ) -> Result<(u128, u128), Error> {
        self.lock()?;
        let result = self.collect_locked(sender, lower, upper, recipient, max0, max1);
        self.unlock();
        result
    }

    fn collect_locked(
        &mut self,
        sender: Address,
        lower: i32,
        upper: i32,
        recipient: Address,
        max0: u128,
        max1: u128,
    ) -> Result<(u128, u128), Error> {
        let position = self
            .positions
            .get(sender, lower, upper)
            .ok_or(PairError::NoPosition)?;
        let amount0 = max0.min(position.fees_owed_0);
        let amount1 = max1.min(position.fees_owed_1);

        // both payouts must clear together with the owed decrement
        Self::ensure_funds(&self.token0, self.address, U256::from(amount0))?;
        Self::ensure_funds(&self.token1, self.address, U256::from(amount1))?;
        if amount0 > 0 {
            self.token0
                .transfer(self.address, recipient, U256::from(amount0))?;
        }
        if amount1 > 0 {
            self.token1
                .transfer(self.address, recipient, U256::from(amount1))?;
        }
        self.positions
            .take_owed(sender, lower, upper, amount0, amount1)?;

        self.events.push(Event::Collect {
            owner: sender,
            tick_lower: lower,
            tick_upper: upper,
            amount0,
            amount1,
        });
        Ok((amount0, amount1))
    }

    // ------------------------------------------------------------------
    // protocol fee & admin
    // ------------------------------------------------------------------

    /// Turns the protocol fee on (`Some(recipient)`) or off (`None`).
    pub fn set_fee_to(&mut self, sender: Address, fee_to: Option<Address>) -> Result<(), Error> {
        self.lock()?;
        let result = (|| {
            if sender != self.owner {
                return Err(PairError::OwnerOnly.into());
            }
            let previous = self.fee_to;
            self.fee_to = fee_to;
            self.events.push(Event::SetFeeTo {
                previous,
                current: fee_to,
            });
            Ok(())
        })();
        self.unlock();
        result
    }

    /// Pays accumulated protocol fees to the `fee_to` address.
    pub fn collect_protocol(
        &mut self,
        sender: Address,
        max0: u128,
        max1: u128,
    ) -> Result<(u128, u128), Error> {
        self.lock()?;
        let result = self.collect_protocol_locked(sender, max0, max1);
        self.unlock();
        result
    }

    fn collect_protocol_locked(
        &mut self,
        sender: Address,
        max0: u128,
        max1: u128,
    ) -> Result<(u128, u128), Error> {
        if sender != self.owner {
            return Err(PairError::OwnerOnly.into());
        }
        let recipient = self.fee_to.unwrap_or(self.owner);
        let mut amount0 = max0.min(self.fee_to_fees_0);
        let mut amount1 = max1.min(self.fee_to_fees_1);
        // a full drain leaves one wei behind in the accumulator
        if amount0 > 0 && amount0 == self.fee_to_fees_0 {
            amount0 -= 1;
        }
        if amount1 > 0 && amount1 == self.fee_to_fees_1 {
            amount1 -= 1;
        }

        // both payouts must clear together with the accumulator decrement
        Self::ensure_funds(&self.token0, self.address, U256::from(amount0))?;
        Self::ensure_funds(&self.token1, self.address, U256::from(amount1))?;
        if amount0 > 0 {
            self.token0
                .transfer(self.address, recipient, U256::from(amount0))?;
        }
        if amount1 > 0 {
            self.token1
                .transfer(self.address, recipient, U256::from(amount1))?;
        }
        self.fee_to_fees_0 -= amount0;
        self.fee_to_fees_1 -= amount1;
        Ok((amount0, amount1))
    }

    /// Testing hook: moves the injected clock.
    pub fn set_time(&self, t: u32) {
        self.clock.set(t);
    }

    /// Returns tokens that were mistakenly sent to the pair. The pair's
    /// own tokens back its books and cannot be recovered.
    pub fn recover(
        &mut self,
        sender: Address,
        token: &mut dyn Token,
        to: Address,
        amount: U256,
    ) -> Result<(), Error> {
        if sender != self.owner {
            return Err(PairError::OwnerOnly.into());
        }
        if token.address() == self.token0.address() || token.address() == self.token1.address() {
            return Err(PairError::RecoverPairToken.into());
        }
        token.transfer(self.address, to, amount)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // swaps
    // ------------------------------------------------------------------

    /// Swaps an exact `amount_in` of token0 for token1.
    pub fn swap_exact_0_for_1<C: SwapCallback<T>>(
        &mut self,
        sender: Address,
        recipient: Address,
        amount_in: U256,
        sqrt_price_limit_x96: Option<U256>,
        callback: &mut C,
        data: &[u8],
    ) -> Result<(I256, I256), Error> {
        self.lock()?;
        let result = self.swap_locked(
            sender,
            recipient,
            true,
            I256::from_raw(amount_in),
            sqrt_price_limit_x96.unwrap_or(MIN_SQRT_RATIO + U256_1),
            callback,
            data,
        );
        self.unlock();
        result
    }

    /// Swaps token0 for an exact `amount_out` of token1.
    pub fn swap_0_for_exact_1<C: SwapCallback<T>>(
        &mut self,
        sender: Address,
        recipient: Address,
        amount_out: U256,
        sqrt_price_limit_x96: Option<U256>,
        callback: &mut C,
        data: &[u8],
    ) -> Result<(I256, I256), Error> {
        self.lock()?;
        let result = self.swap_locked(
            sender,
            recipient,
            true,
            -I256::from_raw(amount_out),
            sqrt_price_limit_x96.unwrap_or(MIN_SQRT_RATIO + U256_1),
            callback,
            data,
        );
        self.unlock();
        result
    }

    /// Swaps an exact `amount_in` of token1 for token0.
    pub fn swap_exact_1_for_0<C: SwapCallback<T>>(
        &mut self,
        sender: Address,
        recipient: Address,
        amount_in: U256,
        sqrt_price_limit_x96: Option<U256>,
        callback: &mut C,
        data: &[u8],
    ) -> Result<(I256, I256), Error> {
        self.lock()?;
        let result = self.swap_locked(
            sender,
            recipient,
            false,
            I256::from_raw(amount_in),
            sqrt_price_limit_x96.unwrap_or(MAX_SQRT_RATIO - U256_1),
            callback,
            data,
        );
        self.unlock();
        result
    }

    /// Swaps token1 for an exact `amount_out` of token0.
    pub fn swap_1_for_exact_0<C: SwapCallback<T>>(
        &mut self,
        sender: Address,
        recipient: Address,
        amount_out: U256,
        sqrt_price_limit_x96: Option<U256>,
        callback: &mut C,
        data: &[u8],
    ) -> Result<(I256, I256), Error> {
        self.lock()?;
        let result = self.swap_locked(
            sender,
            recipient,
            false,
            -I256::from_raw(amount_out),
            sqrt_price_limit_x96.unwrap_or(MAX_SQRT_RATIO - U256_1),
            callback,
            data,
        );
        self.unlock();
        result
    }

    /// Read-only swap: runs the identical loop against current state
    /// without touching the books or the tokens.
    pub fn quote(
        &self,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: U256,
    ) -> Result<QuoteResult, Error> {
        if !self.slot0.unlocked {
            return Err(PairError::Locked.into());
        }
        let (state, _crossings) =
            self.simulate(zero_for_one, amount_specified, sqrt_price_limit_x96)?;
        let (amount0_delta, amount1_delta) =
            settlement_amounts(zero_for_one, amount_specified, &state);
        Ok(QuoteResult {
            amount0_delta,
            amount1_delta,
            fees_paid: state.swap_fee,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn swap_locked<C: SwapCallback<T>>(
        &mut self,
        sender: Address,
        recipient: Address,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: U256,
        callback: &mut C,
        data: &[u8],
    ) -> Result<(I256, I256), Error> {
        let (state, crossings) =
            self.simulate(zero_for_one, amount_specified, sqrt_price_limit_x96)?;
        let (amount0, amount1) = settlement_amounts(zero_for_one, amount_specified, &state);

        // pay the output leg, then demand the input via the callback
        if amount0 < I256::ZERO {
            self.token0
                .transfer(self.address, recipient, amount0.unsigned_abs())?;
        }
        if amount1 < I256::ZERO {
            self.token1
                .transfer(self.address, recipient, amount1.unsigned_abs())?;
        }

        let balance0_before = self.token0.balance_of(self.address);
        let balance1_before = self.token1.balance_of(self.address);
        let pool = self.address;
        callback.on_swap(
            &mut self.token0,
            &mut self.token1,
            pool,
            sender,
            amount0,
            amount1,
            data,
        )?;
        if amount0 > I256::ZERO
            && self.token0.balance_of(self.address) < balance0_before + amount0.unsigned_abs()
        {
            return Err(PairError::Token0NotPaid.into());
        }
        if amount1 > I256::ZERO
            && self.token1.balance_of(self.address) < balance1_before + amount1.unsigned_abs()
        {
            return Err(PairError::Token1NotPaid.into());
        }

        // commit
        let now = self.clock.now();
        let elapsed = now.wrapping_sub(self.slot0.block_timestamp_last);
        self.slot0.tick_cumulative_last = wrap_i56(
            self.slot0
                .tick_cumulative_last
                .wrapping_add((state.tick as i64).wrapping_mul(elapsed as i64)),
        );
        self.slot0.block_timestamp_last = now;
        self.slot0.sqrt_price_x96 = state.sqrt_price_x96;
        self.slot0.tick = state.tick;
        self.liquidity = state.liquidity;
        if zero_for_one {
            self.fee_growth_global_0_x128 = state.fee_growth_global_x128;
            self.fee_to_fees_0 += state.protocol_fee;
        } else {
            self.fee_growth_global_1_x128 = state.fee_growth_global_x128;
            self.fee_to_fees_1 += state.protocol_fee;
        }
        for crossing in crossings {
            self.ticks.cross(
                crossing.tick,
                crossing.fee_growth_global_0_x128,
                crossing.fee_growth_global_1_x128,
                now,
            )?;
        }

        self.events.push(Event::Swap {
            sender,
            recipient,
            amount0,
            amount1,
            sqrt_price_x96: state.sqrt_price_x96,
            tick: state.tick,
        });
        Ok((amount0, amount1))
    }

    /// The swap state machine. Walks initialized ticks in the travel
    /// direction, one `compute_swap_step` per segment, until the
    /// specified amount is used up or the price limit is hit. Pure:
    /// crossings are returned for the caller to apply.
    fn simulate(
        &self,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: U256,
    ) -> Result<(SwapState, Vec<Crossing>), Error> {
        if amount_specified.is_zero() {
            return Err(StateError::AmountSpecifiedIsZero.into());
        }
        if zero_for_one {
            if sqrt_price_limit_x96 >= self.slot0.sqrt_price_x96
                || sqrt_price_limit_x96 <= MIN_SQRT_RATIO
            {
                return Err(StateError::SqrtPriceOutOfBounds.into());
            }
        } else if sqrt_price_limit_x96 <= self.slot0.sqrt_price_x96
            || sqrt_price_limit_x96 >= MAX_SQRT_RATIO
        {
            return Err(StateError::SqrtPriceOutOfBounds.into());
        }

        let exact_input = amount_specified.is_positive();
        let protocol_fee_on = self.fee_to.is_some();

        let mut state = SwapState {
            amount_specified_remaining: amount_specified,
            amount_calculated: I256::ZERO,
            sqrt_price_x96: self.slot0.sqrt_price_x96,
            tick: self.slot0.tick,
            liquidity: self.liquidity,
            fee_growth_global_x128: if zero_for_one {
                self.fee_growth_global_0_x128
            } else {
                self.fee_growth_global_1_x128
            },
            protocol_fee: 0,
            swap_fee: U256::ZERO,
        };
        let mut crossings: Vec<Crossing> = Vec::new();

        while !state.amount_specified_remaining.is_zero()
            && state.sqrt_price_x96 != sqrt_price_limit_x96
        {
            let sqrt_price_start_x96 = state.sqrt_price_x96;

            let (mut tick_next, initialized) =
                self.ticks.next_initialized_tick(state.tick, zero_for_one)?;
            tick_next = tick_next.clamp(MIN_TICK, MAX_TICK);

            let sqrt_price_next_x96 = get_sqrt_ratio_at_tick(tick_next)?;
            let sqrt_price_target_x96 = if zero_for_one {
                if sqrt_price_next_x96 < sqrt_price_limit_x96 {
                    sqrt_price_limit_x96
                } else {
                    sqrt_price_next_x96
                }
            } else if sqrt_price_next_x96 > sqrt_price_limit_x96 {
                sqrt_price_limit_x96
            } else {
                sqrt_price_next_x96
            };

            let (sqrt_price_after, amount_in, amount_out, mut fee_amount) = compute_swap_step(
                state.sqrt_price_x96,
                sqrt_price_target_x96,
                state.liquidity,
                state.amount_specified_remaining,
                self.fee,
            )?;
            state.sqrt_price_x96 = sqrt_price_after;
            state.swap_fee += fee_amount;

            if exact_input {
                state.amount_specified_remaining -= I256::from_raw(amount_in + fee_amount);
                state.amount_calculated -= I256::from_raw(amount_out);
            } else {
                state.amount_specified_remaining += I256::from_raw(amount_out);
                state.amount_calculated += I256::from_raw(amount_in + fee_amount);
            }

            if protocol_fee_on {
                let delta = fee_amount / U256::from(PROTOCOL_FEE_SHARE);
                state.protocol_fee += low_u128(delta);
                fee_amount -= delta;
            }

            if state.liquidity > 0 {
                state.fee_growth_global_x128 = state
                    .fee_growth_global_x128
                    .wrapping_add(mul_div(fee_amount, Q128, U256::from(state.liquidity))?);
            }

            // crossing fires only on landing exactly at the boundary,
            // never on a partial fill that stops inside the tick
            if state.sqrt_price_x96 == sqrt_price_next_x96 {
                if initialized {
                    let (global_0, global_1) = if zero_for_one {
                        (state.fee_growth_global_x128, self.fee_growth_global_1_x128)
                    } else {
                        (self.fee_growth_global_0_x128, state.fee_growth_global_x128)
                    };
                    crossings.push(Crossing {
                        tick: tick_next,
                        fee_growth_global_0_x128: global_0,
                        fee_growth_global_1_x128: global_1,
                    });

                    let mut liquidity_net = self
                        .ticks
                        .liquidity_net(tick_next)
                        .ok_or(StateError::TickOutOfBounds)?;
                    if zero_for_one {
                        liquidity_net = -liquidity_net;
                    }
                    state.liquidity = add_delta(state.liquidity, liquidity_net)?;
                }
                // moving down lands just below the boundary
                state.tick = if zero_for_one { tick_next - 1 } else { tick_next };
            } else if state.sqrt_price_x96 != sqrt_price_start_x96 {
                state.tick = get_tick_at_sqrt_ratio(state.sqrt_price_x96)?;
            }
        }

        Ok((state, crossings))
    }

    // ------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------

    /// Both legs of a paired transfer must be able to clear before
    /// either balance moves.
    fn ensure_funds(token: &T, from: Address, amount: U256) -> Result<(), Error> {
        if token.balance_of(from) < amount {
            return Err(TokenError::InsufficientBalance.into());
        }
        Ok(())
    }

    fn lock(&mut self) -> Result<(), Error> {
        if !self.slot0.unlocked {
            return Err(PairError::Locked.into());
        }
        self.slot0.unlocked = false;
        Ok(())
    }

    fn unlock(&mut self) {
        self.slot0.unlocked = true;
    }

    fn check_ticks(&self, lower: i32, upper: i32) -> Result<(), Error> {
        if lower >= upper {
            return Err(PairError::TickOrder.into());
        }
        if lower < self.min_tick {
            return Err(PairError::TickLowerOutOfBounds.into());
        }
        if upper > self.max_tick {
            return Err(PairError::TickUpperOutOfBounds.into());
        }
        if lower % self.tick_spacing != 0 || upper % self.tick_spacing != 0 {
            return Err(PairError::TickSpacing.into());
        }
        Ok(())
    }

    fn amounts_for_liquidity_delta(
        &self,
        lower: i32,
        upper: i32,
        liquidity_delta: i128,
    ) -> Result<(I256, I256), Error> {
        self.amounts_for_delta_at(
            self.slot0.tick,
            self.slot0.sqrt_price_x96,
            lower,
            upper,
            liquidity_delta,
        )
    }

    /// Token amounts a liquidity delta moves, given the current price.
    /// Below the range only token0 is involved, above it only token1,
    /// and inside it both, split at the current price.
    fn amounts_for_delta_at(
        &self,
        tick_current: i32,
        sqrt_price_x96: U256,
        lower: i32,
        upper: i32,
        liquidity_delta: i128,
    ) -> Result<(I256, I256), Error> {
        let ratio_lower = get_sqrt_ratio_at_tick(lower)?;
        let ratio_upper = get_sqrt_ratio_at_tick(upper)?;

        if tick_current < lower {
            Ok((
                get_amount_0_delta(ratio_lower, ratio_upper, liquidity_delta)?,
                I256::ZERO,
            ))
        } else if tick_current < upper {
            Ok((
                get_amount_0_delta(sqrt_price_x96, ratio_upper, liquidity_delta)?,
                get_amount_1_delta(ratio_lower, sqrt_price_x96, liquidity_delta)?,
            ))
        } else {
            Ok((
                I256::ZERO,
                get_amount_1_delta(ratio_lower, ratio_upper, liquidity_delta)?,
            ))
        }
    }

    /// Shared tail of mint/burn/initialize: updates both endpoint
    /// ticks, settles the position against the inside growth, applies
    /// in-range liquidity, and clears ticks that flipped out.
    fn apply_position_update(
        &mut self,
        owner: Address,
        lower: i32,
        upper: i32,
        liquidity_delta: i128,
        now: u32,
    ) -> Result<(), Error> {
        let flipped_lower = self.ticks.update(
            lower,
            self.slot0.tick,
            liquidity_delta,
            self.fee_growth_global_0_x128,
            self.fee_growth_global_1_x128,
            now,
            false,
        )?;
        let flipped_upper = self.ticks.update(
            upper,
            self.slot0.tick,
            liquidity_delta,
            self.fee_growth_global_0_x128,
            self.fee_growth_global_1_x128,
            now,
            true,
        )?;

        let (inside_0, inside_1) = self.ticks.fee_growth_inside(
            lower,
            upper,
            self.slot0.tick,
            self.fee_growth_global_0_x128,
            self.fee_growth_global_1_x128,
        );
        self.positions
            .update(owner, lower, upper, liquidity_delta, inside_0, inside_1)?;

        if flipped_lower && !self.ticks.is_initialized(lower) {
            self.ticks.clear(lower);
        }
        if flipped_upper && !self.ticks.is_initialized(upper) {
            self.ticks.clear(upper);
        }

        if self.slot0.tick >= lower && self.slot0.tick < upper {
            self.liquidity = add_delta(self.liquidity, liquidity_delta)?;
        }
        Ok(())
    }
}

fn settlement_amounts(
    zero_for_one: bool,
    amount_specified: I256,
    state: &SwapState,
) -> (I256, I256) {
    let exact_input = amount_specified.is_positive();
    if zero_for_one == exact_input {
        (
            amount_specified - state.amount_specified_remaining,
            state.amount_calculated,
        )
    } else {
        (
            state.amount_calculated,
            amount_specified - state.amount_specified_remaining,
        )
    }
}
