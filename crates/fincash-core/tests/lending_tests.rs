use fincash_core::lending::amortization::{
    calculate_loan, compare_amortization_types, generate_schedule, AmortizationType, LoanInput,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn relative_diff(a: Decimal, b: Decimal) -> Decimal {
    ((a - b) / b).abs()
}

#[test]
fn test_constant_schedule_repays_principal() {
    let input = LoanInput {
        principal: dec!(250000),
        annual_rate: dec!(0.042),
        duration_months: 240,
        amortization_type: AmortizationType::Constant,
    };
    let out = calculate_loan(&input).unwrap().result;

    let repaid: Decimal = out.schedule.iter().map(|p| p.principal_portion).sum();
    assert!(relative_diff(repaid, dec!(250000)) < dec!(0.000001));
    assert_eq!(out.schedule.len(), 240);
    assert_eq!(out.schedule[239].remaining_balance, Decimal::ZERO);
    assert_eq!(out.total_cost, dec!(250000) + out.total_interest);
}

#[test]
fn test_interest_ordering_for_positive_rate() {
    let cmp = compare_amortization_types(dec!(1000000), dec!(0.06), 12).unwrap();
    assert!(cmp.linear.total_interest < cmp.constant.total_interest);
    assert!(cmp.constant.total_interest < cmp.in_fine.total_interest);
    // In-fine: 12 months of 5,000 interest
    assert!((cmp.in_fine.total_interest - dec!(60000)).abs() < dec!(0.0001));
    assert!((cmp.in_fine.first_payment - dec!(5000)).abs() < dec!(0.0001));
}

#[test]
fn test_every_row_balances() {
    for kind in [
        AmortizationType::Constant,
        AmortizationType::Linear,
        AmortizationType::InFine,
    ] {
        let schedule = generate_schedule(dec!(120000), dec!(0.005), 36, kind).unwrap();
        let mut previous = dec!(120000);
        for row in &schedule {
            assert_eq!(row.payment, row.principal_portion + row.interest_portion);
            assert!(row.remaining_balance <= previous);
            previous = row.remaining_balance;
        }
        assert_eq!(previous, Decimal::ZERO);
    }
}

#[test]
fn test_single_period_loan() {
    let schedule = generate_schedule(dec!(1000), dec!(0.01), 1, AmortizationType::Linear).unwrap();
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].principal_portion, dec!(1000));
    assert_eq!(schedule[0].interest_portion, dec!(10));
    assert_eq!(schedule[0].payment, dec!(1010));
}

#[test]
fn test_loan_reports_comparison_and_rate() {
    let out = calculate_loan(&LoanInput::default()).unwrap().result;
    assert!((out.comparison.constant.first_payment - out.initial_payment).abs() < dec!(0.000001));
    assert!(out.effective_global_rate > Decimal::ZERO);
    assert!(out.recommendations[0].contains("constant"));
}
