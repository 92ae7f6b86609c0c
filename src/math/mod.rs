//! Numeric leaves: fixed-point primitives, the tick <-> sqrt-price
//! bijection, per-step swap math, and the tick bitmap.

pub mod bit_math;
pub mod full_math;
pub mod liquidity_math;
pub mod sqrt_price_math;
pub mod swap_math;
pub mod tick_bitmap;
pub mod tick_math;
