//! Property-based tests for lnpos-core
//!
//! Uses proptest to verify tip and conversion invariants across randomized inputs

use lnpos_core::{
    decode_amount_sats, fiat_from_memo, format_memo, parse_percentages, Currency,
    CurrencyContext, TipCalculator, TipSelection, MAX_TIP_PRESETS,
};
use proptest::prelude::*;

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Base amounts up to 21M BTC
fn base_amount_strategy() -> impl Strategy<Value = u64> {
    0u64..=(21_000_000 * 100_000_000)
}

/// Tip percentages
fn percent_strategy() -> impl Strategy<Value = u32> {
    1u32..=100
}

/// Fiat value with at most two fraction digits, as typed by an operator
fn fiat_input_strategy() -> impl Strategy<Value = String> {
    (0u64..1_000_000).prop_map(|cents| format!("{}.{:02}", cents / 100, cents % 100))
}

/// Satoshis per fiat unit
fn rate_strategy() -> impl Strategy<Value = f64> {
    1.0f64..100_000.0
}

// ============================================================================
// Tip Properties
// ============================================================================

proptest! {
    /// Property: percentage tip is round(base * p / 100)
    #[test]
    fn prop_percentage_tip_rounds_to_nearest(
        base in base_amount_strategy(),
        percent in percent_strategy()
    ) {
        let tip = TipCalculator::new().percentage_tip(base, percent).unwrap();
        let exact = i128::from(base) * i128::from(percent);
        let scaled = i128::from(tip) * 100;

        prop_assert!(scaled - exact <= 50);
        prop_assert!(exact - scaled < 50);
    }

    /// Property: fiat custom tip is round(v * rate)
    #[test]
    fn prop_custom_fiat_tip_converts_with_rate(
        input in fiat_input_strategy(),
        rate in rate_strategy()
    ) {
        let ctx = CurrencyContext::with_rate(Currency::USD, rate).unwrap();
        let value: f64 = input.parse().unwrap();

        let tip = TipCalculator::new()
            .tip_amount(10_000, TipSelection::Custom, &input, &ctx)
            .unwrap();
        prop_assert_eq!(tip, (value * rate).round() as u64);
    }

    /// Property: SATS custom tip is floor(parse(input))
    #[test]
    fn prop_custom_sats_tip_is_floor(
        whole in 0u64..1_000_000_000_000,
        fraction in 0u32..1000
    ) {
        let input = format!("{}.{}", whole, fraction);
        let tip = TipCalculator::new()
            .tip_amount(0, TipSelection::Custom, &input, &CurrencyContext::sats())
            .unwrap();
        prop_assert_eq!(tip, whole);
    }

    /// Property: parsed presets are never empty, distinct, positive and capped
    #[test]
    fn prop_parsed_percentages_invariants(input in ".{0,64}") {
        let presets = parse_percentages(&input);

        prop_assert!(!presets.is_empty());
        prop_assert!(presets.len() <= MAX_TIP_PRESETS);
        prop_assert!(presets.iter().all(|p| *p > 0));
        for (i, p) in presets.iter().enumerate() {
            prop_assert!(!presets[i + 1..].contains(p));
        }
    }
}

// ============================================================================
// Conversion and Memo Properties
// ============================================================================

proptest! {
    /// Property: sats -> fiat -> sats stays within one satoshi
    #[test]
    fn prop_conversion_round_trip(
        sats in 0u64..10_000_000_000,
        rate in rate_strategy()
    ) {
        let ctx = CurrencyContext::with_rate(Currency::EUR, rate).unwrap();
        let fiat = ctx.from_sats(sats).unwrap();
        let back = ctx.to_sats(fiat).unwrap();

        prop_assert!(back.abs_diff(sats) <= 1);
    }

    /// Property: the fiat string embedded in a memo is recovered verbatim
    #[test]
    fn prop_memo_fiat_recovered(
        label in "[A-Za-z][A-Za-z ]{0,30}[A-Za-z]",
        input in fiat_input_strategy()
    ) {
        let fiat = format!("${}", input);
        let memo = format_memo(&label, Some(&fiat));
        prop_assert_eq!(fiat_from_memo(&memo), Some(fiat.as_str()));
    }

    /// Property: micro-bitcoin amounts decode to amount * 100 sats
    #[test]
    fn prop_decode_micro_amounts(amount in 1u64..100_000_000) {
        let request = format!("lnbc{}u1pvjluezpp5qqqsyqcyq5", amount);
        prop_assert_eq!(decode_amount_sats(&request), Some(amount * 100));
    }
}
