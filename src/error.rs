//! Error taxonomy for the pair engine.
//!
//! Every externally visible failure carries a short tag as the leading
//! token of its display message (`AI`, `LOK`, `TS`, ...). Callers that
//! only need the tag can use [`Error::tag`]; the rest of the message is
//! diagnostic and may change.

use thiserror::Error;

/// Failures of the 256-bit fixed-point primitives.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    #[error("OVERFLOW: quotient does not fit in 256 bits")]
    Overflow,
    #[error("OVERFLOW: division by zero")]
    DivisionByZero,
    #[error("bit scan of zero value")]
    ZeroValue,
    #[error("TS: tick not aligned to spacing")]
    UnalignedTick,
}

/// Checked liquidity delta application; fee growth never takes this
/// path (it wraps by design).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LiquidityError {
    #[error("LS: liquidity subtraction underflow")]
    Underflow,
    #[error("LA: liquidity addition overflow")]
    Overflow,
}

/// Price/tick domain violations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    #[error("R: sqrt price outside the valid tick range")]
    SqrtPriceOutOfBounds,
    #[error("R: tick outside the valid range")]
    TickOutOfBounds,
    #[error("sqrt price is zero")]
    SqrtPriceIsZero,
    #[error("sqrt ratio is zero")]
    SqrtRatioIsZero,
    #[error("liquidity is zero")]
    LiquidityIsZero,
    #[error("requested amount exceeds pool reserves")]
    InsufficientReserves,
    #[error("amount specified is zero")]
    AmountSpecifiedIsZero,
}

/// Engine-level validation and settlement failures.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PairError {
    #[error("AI: already initialized")]
    AlreadyInitialized,
    #[error("LOK: pair locked or not initialized")]
    Locked,
    #[error("MIN: price below the minimum usable tick")]
    PriceBelowRange,
    #[error("MAX: price at or above the maximum usable tick")]
    PriceAboveRange,
    #[error("TLU: lower tick must be below upper tick")]
    TickOrder,
    #[error("TLM: lower tick below minimum")]
    TickLowerOutOfBounds,
    #[error("TUM: upper tick above maximum")]
    TickUpperOutOfBounds,
    #[error("TS: tick not a multiple of the tick spacing")]
    TickSpacing,
    #[error("LO: liquidity exceeds the per-tick maximum")]
    TickLiquidityOverflow,
    #[error("NP: no such position")]
    NoPosition,
    #[error("CP: cannot burn more than the position's liquidity")]
    BurnExceedsPosition,
    #[error("OO: owner only")]
    OwnerOnly,
    #[error("TOK: cannot recover a pair token")]
    RecoverPairToken,
    #[error("M0: token0 not paid in full")]
    Token0NotPaid,
    #[error("M1: token1 not paid in full")]
    Token1NotPaid,
}

/// Failures surfaced by the token collaborator; the engine never
/// swallows these.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("XFER: insufficient token balance")]
    InsufficientBalance,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Math(#[from] MathError),

    #[error(transparent)]
    Liquidity(#[from] LiquidityError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Pair(#[from] PairError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl Error {
    /// The short tag identifying the failure, stable across releases.
    pub fn tag(&self) -> &'static str {
        match self {
            Error::Math(MathError::Overflow) | Error::Math(MathError::DivisionByZero) => "OVERFLOW",
            Error::Math(MathError::ZeroValue) => "BITS",
            Error::Math(MathError::UnalignedTick) => "TS",
            Error::Liquidity(LiquidityError::Underflow) => "LS",
            Error::Liquidity(LiquidityError::Overflow) => "LA",
            Error::State(StateError::SqrtPriceOutOfBounds)
            | Error::State(StateError::TickOutOfBounds) => "R",
            Error::State(_) => "SP",
            Error::Pair(PairError::AlreadyInitialized) => "AI",
            Error::Pair(PairError::Locked) => "LOK",
            Error::Pair(PairError::PriceBelowRange) => "MIN",
            Error::Pair(PairError::PriceAboveRange) => "MAX",
            Error::Pair(PairError::TickOrder) => "TLU",
            Error::Pair(PairError::TickLowerOutOfBounds) => "TLM",
            Error::Pair(PairError::TickUpperOutOfBounds) => "TUM",
            Error::Pair(PairError::TickSpacing) => "TS",
            Error::Pair(PairError::TickLiquidityOverflow) => "LO",
            Error::Pair(PairError::NoPosition) => "NP",
            Error::Pair(PairError::BurnExceedsPosition) => "CP",
            Error::Pair(PairError::OwnerOnly) => "OO",
            Error::Pair(PairError::RecoverPairToken) => "TOK",
            Error::Pair(PairError::Token0NotPaid) => "M0",
            Error::Pair(PairError::Token1NotPaid) => "M1",
            Error::Token(TokenError::InsufficientBalance) => "XFER",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_preserved_in_display() {
        let cases: [(Error, &str); 6] = [
            (PairError::AlreadyInitialized.into(), "AI"),
            (PairError::TickSpacing.into(), "TS"),
            (PairError::Token0NotPaid.into(), "M0"),
            (LiquidityError::Underflow.into(), "LS"),
            (LiquidityError::Overflow.into(), "LA"),
            (StateError::SqrtPriceOutOfBounds.into(), "R"),
        ];
        for (err, tag) in cases {
            assert_eq!(err.tag(), tag);
            assert!(
                err.to_string().starts_with(tag),
                "display of {err:?} must lead with its tag"
            );
        }
    }
}
