//! # Tick Math
//!
//! Conversions between ticks, Q64.96 square-root prices and human prices,
//! plus selection of a tick range around the pool's current tick.
//!
//! Prices are quoted as token1 per token0 in human units, which is why every
//! conversion takes `decimals_diff = token0.decimals - token1.decimals`.

use alloy_primitives::U256;

use crate::error::{MathError, MathResult};

/// Lowest tick supported by the pool contracts
pub const MIN_TICK: i32 = -887272;

/// Highest tick supported by the pool contracts
pub const MAX_TICK: i32 = 887272;

/// Price ratio between two adjacent ticks
pub const TICK_BASE: f64 = 1.0001;

/// 2^96, the fixed-point unit of a Q64.96 square-root price
pub const Q96: f64 = 79_228_162_514_264_337_593_543_950_336.0;

/// 2^64, weight of one `U256` limb
const LIMB_BASE: f64 = 18_446_744_073_709_551_616.0;

/// A tick interval aligned to the pool's tick spacing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickRange {
    pub lower: i32,
    pub upper: i32,
}

impl TickRange {
    /// Whether `tick` lies in `[lower, upper)`, the protocol's in-range test
    pub fn contains(&self, tick: i32) -> bool {
        self.lower <= tick && tick < self.upper
    }

    /// Width of the range in ticks
    pub fn width(&self) -> i64 {
        i64::from(self.upper) - i64::from(self.lower)
    }
}

/// Decimal difference used to turn raw ratios into human prices
pub fn decimals_diff(token0_decimals: u8, token1_decimals: u8) -> i32 {
    i32::from(token0_decimals) - i32::from(token1_decimals)
}

/// Human price (token1 per token0) at `tick`
pub fn tick_to_price(tick: i32, decimals_diff: i32) -> f64 {
    TICK_BASE.powi(tick) * 10f64.powi(decimals_diff)
}

/// Human price (token1 per token0) encoded by a pool's `sqrtPriceX96`
pub fn sqrt_price_x96_to_price(sqrt_price_x96: U256, decimals_diff: i32) -> f64 {
    let ratio = u256_to_f64(sqrt_price_x96) / Q96;
    ratio * ratio * 10f64.powi(decimals_diff)
}

/// Lossy conversion of a `U256` to the nearest `f64`
pub fn u256_to_f64(value: U256) -> f64 {
    value
        .as_limbs()
        .iter()
        .rev()
        .fold(0.0, |acc, &limb| acc * LIMB_BASE + limb as f64)
}

/// Compute the position range around `current_tick`.
///
/// The current tick is floored to a multiple of `tick_spacing` (towards
/// negative infinity, so `-250` with spacing `100` floors to `-300`). The
/// single spacing interval containing the current tick is then widened by
/// `lower_units` spacings below and `upper_units` spacings above.
pub fn compute_range(
    current_tick: i32,
    tick_spacing: i32,
    lower_units: u32,
    upper_units: u32,
) -> MathResult<TickRange> {
    if tick_spacing <= 0 {
        return Err(MathError::InvalidTickSpacing(tick_spacing));
    }

    let current = i64::from(current_tick);
    let spacing = i64::from(tick_spacing);

    let raw_lower = current - current.rem_euclid(spacing);
    let raw_upper = raw_lower + spacing;

    let lower = i64::from(lower_units)
        .checked_mul(spacing)
        .and_then(|offset| raw_lower.checked_sub(offset))
        .ok_or(MathError::Overflow("compute_range lower"))?;
    let upper = i64::from(upper_units)
        .checked_mul(spacing)
        .and_then(|offset| raw_upper.checked_add(offset))
        .ok_or(MathError::Overflow("compute_range upper"))?;

    Ok(TickRange {
        lower: checked_tick(lower)?,
        upper: checked_tick(upper)?,
    })
}

fn checked_tick(tick: i64) -> MathResult<i32> {
    if tick < i64::from(MIN_TICK) || tick > i64::from(MAX_TICK) {
        return Err(MathError::TickOutOfBounds {
            tick,
            min: MIN_TICK,
            max: MAX_TICK,
        });
    }
    Ok(tick as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        let tolerance = expected.abs() * 1e-9;
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {} got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_tick_zero_is_unit_price() {
        assert_eq!(tick_to_price(0, 0), 1.0);
    }

    #[test]
    fn test_tick_to_price_applies_decimals() {
        assert_close(tick_to_price(0, 12), 1e12);
        assert_close(tick_to_price(0, -12), 1e-12);
        assert_close(tick_to_price(1, 0), 1.0001);
        assert_close(tick_to_price(-1, 0), 1.0 / 1.0001);
    }

    #[test]
    fn test_tick_to_price_is_monotonic() {
        let ticks = [MIN_TICK, -500_000, -10_000, -1, 0, 1, 10_000, 500_000, MAX_TICK];
        for diff in [-12, 0, 12] {
            for pair in ticks.windows(2) {
                assert!(tick_to_price(pair[0], diff) < tick_to_price(pair[1], diff));
            }
            for tick in -2_000..2_000 {
                assert!(tick_to_price(tick, diff) < tick_to_price(tick + 1, diff));
            }
        }
    }

    #[test]
    fn test_tick_bounds_stay_finite() {
        let high = tick_to_price(MAX_TICK, 0);
        let low = tick_to_price(MIN_TICK, 0);
        assert!(high.is_finite() && high > 1e38);
        assert!(low > 0.0 && low < 1e-38);
    }

    #[test]
    fn test_sqrt_price_unit() {
        let one = U256::from(1u64) << 96;
        assert_close(sqrt_price_x96_to_price(one, 0), 1.0);
        assert_close(sqrt_price_x96_to_price(one << 1, 0), 4.0);
        assert_close(sqrt_price_x96_to_price(one, -12), 1e-12);
    }

    #[test]
    fn test_sqrt_price_matches_tick_price() {
        // sqrtPriceX96 observed for a WETH/USDC-style pool near tick -200000
        let sqrt_price = U256::from(3_598_751_402_009_485_339_468_644u128);
        let from_sqrt = sqrt_price_x96_to_price(sqrt_price, 12);
        let from_tick = tick_to_price(-200_000, 12);
        assert!((from_sqrt / from_tick - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_u256_to_f64_spans_limbs() {
        assert_eq!(u256_to_f64(U256::ZERO), 0.0);
        assert_eq!(u256_to_f64(U256::from(12345u64)), 12345.0);
        assert_eq!(u256_to_f64(U256::from(1u64) << 128), 2f64.powi(128));
    }

    #[test]
    fn test_compute_range_scenario() {
        let range = compute_range(250, 100, 3, 3).unwrap();
        assert_eq!(range, TickRange { lower: -100, upper: 600 });
    }

    #[test]
    fn test_compute_range_zero_units_is_one_spacing() {
        let range = compute_range(250, 100, 0, 0).unwrap();
        assert_eq!(range, TickRange { lower: 200, upper: 300 });
        assert_eq!(range.width(), 100);
    }

    #[test]
    fn test_compute_range_negative_tick_floors() {
        let range = compute_range(-250, 100, 0, 0).unwrap();
        assert_eq!(range, TickRange { lower: -300, upper: -200 });
        assert!(range.contains(-250));

        let range = compute_range(-1, 60, 1, 2).unwrap();
        assert_eq!(range, TickRange { lower: -120, upper: 120 });
    }

    #[test]
    fn test_compute_range_aligned_tick() {
        let range = compute_range(-200, 100, 1, 1).unwrap();
        assert_eq!(range, TickRange { lower: -300, upper: -100 });
    }

    #[test]
    fn test_compute_range_rejects_bad_spacing() {
        assert_eq!(compute_range(0, 0, 1, 1), Err(MathError::InvalidTickSpacing(0)));
        assert_eq!(compute_range(0, -10, 1, 1), Err(MathError::InvalidTickSpacing(-10)));
    }

    #[test]
    fn test_compute_range_rejects_out_of_bounds() {
        let result = compute_range(887_000, 200, 0, 10);
        assert!(matches!(result, Err(MathError::TickOutOfBounds { .. })));

        let result = compute_range(0, 200, u32::MAX, 0);
        assert!(matches!(result, Err(MathError::TickOutOfBounds { .. })));
    }
}
