//! Observable side effects, recorded in order on the engine and
//! drained by the embedder.

use alloy_primitives::{Address, I256, U256};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Initialized {
        sqrt_price_x96: U256,
        tick: i32,
    },
    Mint {
        sender: Address,
        owner: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
        amount0: U256,
        amount1: U256,
    },
    Burn {
        owner: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
        amount0: U256,
        amount1: U256,
    },
    Collect {
        owner: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount0: u128,
        amount1: u128,
    },
    Swap {
        sender: Address,
        recipient: Address,
        amount0: I256,
        amount1: I256,
        sqrt_price_x96: U256,
        tick: i32,
    },
    SetFeeTo {
        previous: Option<Address>,
        current: Option<Address>,
    },
}
