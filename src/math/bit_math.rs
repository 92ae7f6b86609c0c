use crate::error::MathError;
use alloy_primitives::U256;

/// Index (0-255) of the most significant set bit, or
/// [`MathError::ZeroValue`] for zero input.
pub fn most_significant_bit(x: U256) -> Result<u8, MathError> {
    if x.is_zero() {
        return Err(MathError::ZeroValue);
    }
    Ok(255 - x.leading_zeros() as u8)
}

/// Index (0-255) of the least significant set bit, or
/// [`MathError::ZeroValue`] for zero input. Used when scanning bitmap
/// words upward for the first initialized tick.
pub fn least_significant_bit(x: U256) -> Result<u8, MathError> {
    if x.is_zero() {
        return Err(MathError::ZeroValue);
    }
    Ok(x.trailing_zeros() as u8)
}
