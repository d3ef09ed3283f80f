use fincash_core::derivatives::options::{price_option, OptionInput, OptionType};
use fincash_core::fixed_income::bonds::{price_bond, BondInput};
use fincash_core::FincashError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn approx_eq(a: Decimal, b: Decimal, tol: Decimal) -> bool {
    (a - b).abs() < tol
}

// ===========================================================================
// Black-Scholes
// ===========================================================================

#[test]
fn test_black_scholes_reference_call() {
    let out = price_option(&OptionInput::default()).unwrap().result;
    assert!(
        approx_eq(out.price, dec!(10.45), dec!(0.01)),
        "Expected call ~10.45, got {}",
        out.price
    );
    assert!(approx_eq(out.delta, dec!(0.637), dec!(0.001)));
}

#[test]
fn test_put_call_parity_across_strikes() {
    for strike in [dec!(80), dec!(95), dec!(100), dec!(120)] {
        let call_input = OptionInput {
            spot_price: dec!(100),
            strike_price: strike,
            time_to_expiry: dec!(0.75),
            risk_free_rate: dec!(0.04),
            volatility: dec!(0.3),
            option_type: OptionType::Call,
        };
        let put_input = OptionInput {
            option_type: OptionType::Put,
            ..call_input.clone()
        };
        let call = price_option(&call_input).unwrap().result;
        let put = price_option(&put_input).unwrap().result;

        let forward_gap = call.price - call.parity_price;
        assert!(
            approx_eq(call.price - put.price, forward_gap, dec!(0.000001)),
            "parity broken at K={strike}"
        );
        assert!(approx_eq(call.parity_price, put.price, dec!(0.000001)));
    }
}

#[test]
fn test_option_rejects_expired_contract() {
    let input = OptionInput {
        time_to_expiry: Decimal::ZERO,
        ..OptionInput::default()
    };
    match price_option(&input).unwrap_err() {
        FincashError::InvalidInput { field, .. } => assert_eq!(field, "time_to_expiry"),
        other => panic!("Expected InvalidInput, got {other:?}"),
    }
}

// ===========================================================================
// Bonds
// ===========================================================================

#[test]
fn test_bond_at_par_for_every_frequency() {
    for frequency in [1u32, 2, 4, 12] {
        let input = BondInput {
            face_value: dec!(1000),
            coupon_rate: dec!(0.045),
            market_rate: dec!(0.045),
            years_to_maturity: dec!(7),
            frequency,
            current_price: None,
        };
        let out = price_bond(&input).unwrap().result;
        assert!(
            approx_eq(out.price, dec!(1000), dec!(0.0001)),
            "frequency {frequency}: price {}",
            out.price
        );
        assert_eq!(out.price_classification, "par");
    }
}

#[test]
fn test_bond_premium_when_coupon_above_market() {
    let input = BondInput {
        coupon_rate: dec!(0.08),
        market_rate: dec!(0.05),
        ..BondInput::default()
    };
    let out = price_bond(&input).unwrap().result;
    assert!(out.price > dec!(1000));
    assert_eq!(out.price_classification, "premium");
    assert!(approx_eq(out.yield_to_maturity, dec!(0.05), dec!(0.000001)));
}

#[test]
fn test_bond_duration_below_maturity_for_coupon_bond() {
    let out = price_bond(&BondInput::default()).unwrap().result;
    assert!(out.duration < dec!(5));
    assert!(out.modified_duration < out.duration);
    assert!(out.rate_risk_1pct < Decimal::ZERO);
}
