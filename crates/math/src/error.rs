use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised by the pure math layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    /// Tick spacing must be strictly positive
    #[error("Invalid tick spacing {0}: must be greater than 0")]
    InvalidTickSpacing(i32),

    /// Computed tick left the protocol's tick bounds
    #[error("Tick {tick} not in valid range [{min}, {max}]")]
    TickOutOfBounds { tick: i64, min: i32, max: i32 },

    /// Token amounts are never negative
    #[error("Negative token amount: {0}")]
    NegativeAmount(Decimal),

    /// Decimal count whose scale cannot be represented
    #[error("Unsupported token decimals: {0}")]
    UnsupportedDecimals(u8),

    /// Arithmetic overflow
    #[error("Math overflow in '{0}'")]
    Overflow(&'static str),
}

/// Result type alias for math operations
pub type MathResult<T> = Result<T, MathError>;
