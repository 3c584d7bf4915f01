//! # Range Properties
//!
//! Property tests for tick range selection and unit conversion.

use aero_math::*;
use alloy_primitives::U256;
use proptest::prelude::*;
use rust_decimal::Decimal;

proptest! {
    #[test]
    fn prop_range_bounds_are_spacing_multiples(
        current_tick in -800_000i32..800_000,
        tick_spacing in 1i32..=200,
        lower_units in 0u32..50,
        upper_units in 0u32..50,
    ) {
        let range = compute_range(current_tick, tick_spacing, lower_units, upper_units).unwrap();

        prop_assert_eq!(range.lower.rem_euclid(tick_spacing), 0);
        prop_assert_eq!(range.upper.rem_euclid(tick_spacing), 0);
        prop_assert!(range.lower <= current_tick);
        prop_assert!(current_tick < range.upper);
        prop_assert_eq!(
            range.width(),
            i64::from(tick_spacing) * (1 + i64::from(lower_units) + i64::from(upper_units))
        );
    }

    #[test]
    fn prop_range_strictly_brackets_unaligned_tick(
        current_tick in -800_000i32..800_000,
        tick_spacing in 2i32..=200,
        lower_units in 0u32..50,
        upper_units in 0u32..50,
    ) {
        prop_assume!(current_tick.rem_euclid(tick_spacing) != 0 || lower_units > 0);
        let range = compute_range(current_tick, tick_spacing, lower_units, upper_units).unwrap();

        prop_assert!(range.lower < current_tick);
        prop_assert!(current_tick < range.upper);
    }

    #[test]
    fn prop_price_increases_with_tick(tick in (MIN_TICK + 1)..MAX_TICK, diff in -18i32..=18) {
        prop_assert!(tick_to_price(tick - 1, diff) < tick_to_price(tick, diff));
    }

    #[test]
    fn prop_units_round_trip(mantissa in 0u64..u64::MAX, scale in 0u32..=18, decimals in prop::sample::select(vec![0u8, 6, 18])) {
        let scale = scale.min(u32::from(decimals));
        let amount = Decimal::from_i128_with_scale(i128::from(mantissa), scale);

        let base = to_base_units(amount, decimals).unwrap();
        prop_assert_eq!(to_human_units(base, decimals).unwrap(), amount);
    }

    #[test]
    fn prop_base_units_never_lose_integer_part(whole in 0u64..1_000_000_000, decimals in 0u8..=18) {
        let base = to_base_units(Decimal::from(whole), decimals).unwrap();
        prop_assert_eq!(base, U256::from(whole) * pow10(u32::from(decimals)));
    }
}
