//! # Token Units
//!
//! Conversion between human-readable token amounts and the fixed-point
//! integers stored on-chain. All arithmetic is exact: the human side is a
//! `rust_decimal::Decimal`, the on-chain side a `U256`, and no value ever
//! passes through floating point.

use alloy_primitives::U256;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{MathError, MathResult};

/// Largest decimal count whose power of ten still fits in a `U256`
pub const MAX_DECIMALS: u8 = 77;

/// Largest mantissa a `Decimal` can carry (2^96 - 1)
const DECIMAL_MAX_MANTISSA: u128 = (1u128 << 96) - 1;

/// Largest scale a `Decimal` can carry
const DECIMAL_MAX_SCALE: u32 = 28;

/// `10^exp` as a `U256`
pub fn pow10(exp: u32) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// Convert a human-readable amount into on-chain base units.
///
/// Digits beyond `decimals` fractional places are rounded half away from
/// zero, so `1.0000005` at 6 decimals becomes `1_000_001`.
pub fn to_base_units(amount: Decimal, decimals: u8) -> MathResult<U256> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MathError::NegativeAmount(amount));
    }
    if decimals > MAX_DECIMALS {
        return Err(MathError::UnsupportedDecimals(decimals));
    }

    let target_scale = u32::from(decimals);
    let rounded = if amount.scale() > target_scale {
        amount.round_dp_with_strategy(target_scale, RoundingStrategy::MidpointAwayFromZero)
    } else {
        amount
    };

    let mantissa = U256::from(rounded.mantissa().unsigned_abs());
    let shift = target_scale - rounded.scale();

    mantissa
        .checked_mul(pow10(shift))
        .ok_or(MathError::Overflow("to_base_units"))
}

/// Convert on-chain base units into a human-readable amount.
///
/// Amounts whose digits exceed what a `Decimal` can hold lose their least
/// significant fractional digits (truncated); an integer part that does not
/// fit is an overflow.
pub fn to_human_units(amount: U256, decimals: u8) -> MathResult<Decimal> {
    if decimals > MAX_DECIMALS {
        return Err(MathError::UnsupportedDecimals(decimals));
    }

    let ten = U256::from(10u64);
    let max_mantissa = U256::from(DECIMAL_MAX_MANTISSA);
    let mut value = amount;
    let mut scale = u32::from(decimals);

    while scale > 0 && (scale > DECIMAL_MAX_SCALE || value > max_mantissa) {
        value /= ten;
        scale -= 1;
    }

    if value > max_mantissa {
        return Err(MathError::Overflow("to_human_units"));
    }
    let mantissa = u128::try_from(value).map_err(|_| MathError::Overflow("to_human_units"))?;

    Ok(Decimal::from_i128_with_scale(mantissa as i128, scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_to_base_units_scales_by_decimals() {
        assert_eq!(to_base_units(dec("1"), 6).unwrap(), U256::from(1_000_000u64));
        assert_eq!(to_base_units(dec("0.5"), 18).unwrap(), U256::from(500_000_000_000_000_000u128));
        assert_eq!(to_base_units(dec("42"), 0).unwrap(), U256::from(42u64));
        assert_eq!(to_base_units(Decimal::ZERO, 18).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_to_base_units_rounds_excess_digits() {
        assert_eq!(to_base_units(dec("1.0000005"), 6).unwrap(), U256::from(1_000_001u64));
        assert_eq!(to_base_units(dec("1.0000004"), 6).unwrap(), U256::from(1_000_000u64));
        assert_eq!(to_base_units(dec("2.5"), 0).unwrap(), U256::from(3u64));
    }

    #[test]
    fn test_to_base_units_large_amount_at_18_decimals() {
        // 10 billion tokens at 18 decimals does not fit a Decimal scaled value
        let base = to_base_units(dec("10000000000.123456789012345678"), 18).unwrap();
        assert_eq!(base, U256::from_str("10000000000123456789012345678").unwrap());
    }

    #[test]
    fn test_to_base_units_rejects_negative() {
        assert_eq!(
            to_base_units(dec("-1"), 6),
            Err(MathError::NegativeAmount(dec("-1")))
        );
    }

    #[test]
    fn test_unsupported_decimals() {
        assert_eq!(to_base_units(dec("1"), 78), Err(MathError::UnsupportedDecimals(78)));
        assert_eq!(to_human_units(U256::from(1u64), 78), Err(MathError::UnsupportedDecimals(78)));
    }

    #[test]
    fn test_to_human_units() {
        assert_eq!(to_human_units(U256::from(1_000_000u64), 6).unwrap(), dec("1.0"));
        assert_eq!(to_human_units(U256::from(1_500_000u64), 6).unwrap(), dec("1.5"));
        assert_eq!(to_human_units(U256::from(7u64), 0).unwrap(), dec("7"));
    }

    #[test]
    fn test_to_human_units_truncates_unrepresentable_digits() {
        // 2^200 wei is far beyond a Decimal mantissa and must overflow
        let huge = U256::from(1u64) << 200;
        assert_eq!(to_human_units(huge, 18), Err(MathError::Overflow("to_human_units")));

        // 1e30 wei at 18 decimals = 1e12 tokens, representable after dropping digits
        let big = pow10(30) + U256::from(1u64);
        let human = to_human_units(big, 18).unwrap();
        assert_eq!(human.trunc(), dec("1000000000000"));
    }

    #[test]
    fn test_round_trip_for_representable_amounts() {
        let cases = [
            ("123", 0u8),
            ("0", 0),
            ("1.5", 6),
            ("0.000001", 6),
            ("98765.4321", 6),
            ("0.000000000000000001", 18),
            ("3.141592653589793238", 18),
            ("50000.25", 18),
        ];

        for (amount, decimals) in cases {
            let x = dec(amount);
            let base = to_base_units(x, decimals).unwrap();
            let back = to_human_units(base, decimals).unwrap();
            assert_eq!(back, x, "round trip failed for {} at {} decimals", amount, decimals);
        }
    }
}
