//! The asset abstraction the engine settles against.
//!
//! The engine never implements token mechanics; it debits, credits, and
//! reads balances through this trait and lets failures propagate. The
//! in-memory implementation is a plain balance ledger.

use crate::FastMap;
use crate::error::TokenError;
use alloy_primitives::{Address, I256, U256};

pub trait Token {
    fn address(&self) -> Address;

    fn balance_of(&self, account: Address) -> U256;

    /// Moves `amount` from `from` to `to`; fails without effect if the
    /// balance is insufficient.
    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), TokenError>;

    /// Pull-style variant; allowances are outside this engine's scope,
    /// so the default forwards to [`Token::transfer`].
    fn transfer_from(&mut self, from: Address, to: Address, amount: U256) -> Result<(), TokenError> {
        self.transfer(from, to, amount)
    }
}

/// Balance-map token for tests and simulation.
#[derive(Clone, Debug, Default)]
pub struct InMemoryToken {
    address: Address,
    balances: FastMap<Address, U256>,
}

impl InMemoryToken {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            balances: FastMap::default(),
        }
    }

    /// Faucet: creates `amount` out of thin air for `account`.
    pub fn credit(&mut self, account: Address, amount: U256) {
        let balance = self.balances.entry(account).or_default();
        *balance += amount;
    }
}

impl Token for InMemoryToken {
    fn address(&self) -> Address {
        self.address
    }

    fn balance_of(&self, account: Address) -> U256 {
        *self.balances.get(&account).unwrap_or(&U256::ZERO)
    }

    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), TokenError> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(TokenError::InsufficientBalance);
        }
        self.balances.insert(from, from_balance - amount);
        let to_balance = self.balances.entry(to).or_default();
        *to_balance += amount;
        Ok(())
    }
}

/// Swap settlement callback, the flash pattern: the engine pays the
/// output first, then calls this with the signed deltas. Positive
/// deltas are owed to the pool by the time the callback returns;
/// negative deltas were already paid out. The engine re-checks its own
/// balances afterwards.
pub trait SwapCallback<T: Token> {
    #[allow(clippy::too_many_arguments)]
    fn on_swap(
        &mut self,
        token0: &mut T,
        token1: &mut T,
        pool: Address,
        sender: Address,
        amount0_delta: I256,
        amount1_delta: I256,
        data: &[u8],
    ) -> Result<(), TokenError>;
}

/// The ordinary settlement: pays whatever the pool is owed out of one
/// wallet.
#[derive(Clone, Copy, Debug)]
pub struct WalletCallback {
    pub wallet: Address,
}

impl WalletCallback {
    pub fn new(wallet: Address) -> Self {
        Self { wallet }
    }
}

impl<T: Token> SwapCallback<T> for WalletCallback {
    fn on_swap(
        &mut self,
        token0: &mut T,
        token1: &mut T,
        pool: Address,
        _sender: Address,
        amount0_delta: I256,
        amount1_delta: I256,
        _data: &[u8],
    ) -> Result<(), TokenError> {
        if amount0_delta > I256::ZERO {
            token0.transfer(self.wallet, pool, amount0_delta.unsigned_abs())?;
        }
        if amount1_delta > I256::ZERO {
            token1.transfer(self.wallet, pool, amount1_delta.unsigned_abs())?;
        }
        Ok(())
    }
}
