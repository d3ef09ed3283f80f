use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::FincashError;
use crate::sensitivity::{shifted_values, sweep, SensitivitySeries, RATE_DELTAS};
use crate::time_value::{discount_factor, payback_period, solve_irr};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::FincashResult;

const MAX_PROJECT_LIFE: u32 = 100;
/// Largest accepted outlay or single-period cash flow (absolute value).
const MAX_AMOUNT: Money = dec!(1000000000000000);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Capital budgeting input. When `cash_flows` is empty the project is
/// modelled as `project_life` periods of `uniform_cash_flow`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvestmentInput {
    pub initial_investment: Money,
    /// Cash flows for periods 1..n
    pub cash_flows: Vec<Money>,
    pub discount_rate: Rate,
    pub project_life: u32,
    pub uniform_cash_flow: Money,
}

impl Default for InvestmentInput {
    fn default() -> Self {
        Self {
            initial_investment: dec!(1000000),
            cash_flows: Vec::new(),
            discount_rate: dec!(0.10),
            project_life: 5,
            uniform_cash_flow: dec!(200000),
        }
    }
}

/// A single period's cash flow and its present value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountedCashFlow {
    pub period: u32,
    pub gross_amount: Money,
    pub discount_factor: Rate,
    pub present_value: Money,
}

/// Accept/reject flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentDecision {
    pub npv_positive: bool,
    /// False when no IRR exists
    pub irr_exceeds_discount_rate: bool,
    pub profitability_index_acceptable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentOutput {
    pub initial_investment: Money,
    pub discounted_flows: Vec<DiscountedCashFlow>,
    pub npv: Money,
    /// Absent when no admissible root exists
    pub irr: Option<Rate>,
    pub payback_period: Decimal,
    pub discounted_payback_period: Decimal,
    pub profitability_index: Decimal,
    pub decision: InvestmentDecision,
    /// NPV re-evaluated at shifted discount rates
    pub sensitivity: SensitivitySeries,
    pub recommendations: Vec<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Evaluate a capital project with NPV, IRR, simple and discounted payback,
/// and profitability index.
pub fn evaluate_investment(
    input: &InvestmentInput,
) -> FincashResult<ComputationOutput<InvestmentOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_investment_input(input)?;

    let flows = resolve_cash_flows(input);
    let outlay = input.initial_investment;

    let discounted_flows = discount_flows(&flows, input.discount_rate)?;
    let pv_sum = sum_present_values(&discounted_flows)?;
    let npv = pv_sum - outlay;

    let irr = solve_irr(outlay, &flows);
    if irr.is_none() && !flows.is_empty() {
        warnings.push("IRR could not be determined for this cash flow stream".into());
    }

    let payback = payback_period(outlay, &flows);
    let present_values: Vec<Money> = discounted_flows.iter().map(|f| f.present_value).collect();
    let discounted_payback = payback_period(outlay, &present_values);

    if flows.iter().sum::<Money>() < outlay {
        warnings.push(
            "Cash flows never recover the initial investment; payback is reported as the project length"
                .into(),
        );
    }
    if pv_sum < outlay {
        warnings.push(
            "Discounted cash flows never recover the initial investment; discounted payback is reported as the project length"
                .into(),
        );
    }

    let profitability_index = (npv + outlay)
        .checked_div(outlay)
        .ok_or_else(|| FincashError::InvalidInput {
            field: "initial_investment".into(),
            reason: "Profitability index is out of range for this outlay".into(),
        })?;

    let decision = InvestmentDecision {
        npv_positive: npv > Decimal::ZERO,
        irr_exceeds_discount_rate: irr.is_some_and(|r| r > input.discount_rate),
        profitability_index_acceptable: profitability_index > Decimal::ONE,
    };

    let sensitivity = sweep(
        "discount_rate",
        npv,
        &shifted_values(input.discount_rate, &RATE_DELTAS),
        |r| project_npv(outlay, &flows, r),
        &mut warnings,
    );

    let recommendations =
        build_recommendations(npv, irr, payback, profitability_index, input.discount_rate);

    let output = InvestmentOutput {
        initial_investment: outlay,
        discounted_flows,
        npv,
        irr,
        payback_period: payback,
        discounted_payback_period: discounted_payback,
        profitability_index,
        decision,
        sensitivity,
        recommendations,
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Capital budgeting (NPV, IRR, payback, profitability index)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_investment_input(input: &InvestmentInput) -> FincashResult<()> {
    if input.initial_investment <= Decimal::ZERO {
        return Err(FincashError::InvalidInput {
            field: "initial_investment".into(),
            reason: "Initial investment must be positive".into(),
        });
    }
    if input.initial_investment > MAX_AMOUNT {
        return Err(FincashError::InvalidInput {
            field: "initial_investment".into(),
            reason: format!("Initial investment must not exceed {MAX_AMOUNT}"),
        });
    }
    if input.uniform_cash_flow.abs() > MAX_AMOUNT {
        return Err(FincashError::InvalidInput {
            field: "uniform_cash_flow".into(),
            reason: format!("Cash flows must not exceed {MAX_AMOUNT} in absolute value"),
        });
    }
    if let Some(period) = input.cash_flows.iter().position(|cf| cf.abs() > MAX_AMOUNT) {
        return Err(FincashError::InvalidInput {
            field: "cash_flows".into(),
            reason: format!(
                "Cash flow for period {} exceeds {MAX_AMOUNT} in absolute value",
                period + 1
            ),
        });
    }
    if input.discount_rate <= dec!(-1) {
        return Err(FincashError::InvalidInput {
            field: "discount_rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }
    if input.cash_flows.is_empty() && input.project_life > MAX_PROJECT_LIFE {
        return Err(FincashError::InvalidInput {
            field: "project_life".into(),
            reason: format!("Project life cannot exceed {MAX_PROJECT_LIFE} periods"),
        });
    }
    Ok(())
}

fn resolve_cash_flows(input: &InvestmentInput) -> Vec<Money> {
    if input.cash_flows.is_empty() {
        vec![input.uniform_cash_flow; input.project_life as usize]
    } else {
        input.cash_flows.clone()
    }
}

fn discount_flows(flows: &[Money], rate: Rate) -> FincashResult<Vec<DiscountedCashFlow>> {
    flows
        .iter()
        .zip(1u32..)
        .map(|(cf, period)| {
            let df = discount_factor(rate, period)?;
            let present_value = cf.checked_mul(df).ok_or_else(|| FincashError::InvalidInput {
                field: "discount_rate".into(),
                reason: format!("Present value overflows at period {period}"),
            })?;
            Ok(DiscountedCashFlow {
                period,
                gross_amount: *cf,
                discount_factor: df,
                present_value,
            })
        })
        .collect()
}

fn sum_present_values(flows: &[DiscountedCashFlow]) -> FincashResult<Money> {
    flows.iter().try_fold(Decimal::ZERO, |acc, f| {
        acc.checked_add(f.present_value)
            .ok_or_else(|| FincashError::InvalidInput {
                field: "discount_rate".into(),
                reason: "Sum of present values overflows".into(),
            })
    })
}

fn project_npv(outlay: Money, flows: &[Money], rate: Rate) -> FincashResult<Money> {
    let pv = sum_present_values(&discount_flows(flows, rate)?)?;
    Ok(pv - outlay)
}

fn build_recommendations(
    npv: Money,
    irr: Option<Rate>,
    payback: Decimal,
    pi: Decimal,
    discount_rate: Rate,
) -> Vec<String> {
    let mut recs = Vec::new();

    if npv > Decimal::ZERO {
        recs.push(format!("Positive NPV ({npv:.0}): the project creates value"));
    } else {
        recs.push(format!("Negative NPV ({npv:.0}): the project destroys value"));
    }

    if let Some(r) = irr {
        let irr_pct = r * dec!(100);
        let cost_pct = discount_rate * dec!(100);
        if r > discount_rate {
            recs.push(format!(
                "IRR ({irr_pct:.1}%) exceeds the cost of capital ({cost_pct:.1}%)"
            ));
        } else {
            recs.push(format!(
                "IRR ({irr_pct:.1}%) is below the cost of capital ({cost_pct:.1}%)"
            ));
        }
    }

    if payback <= dec!(3) {
        recs.push(format!("Short payback period ({payback:.1} years)"));
    } else if payback <= dec!(5) {
        recs.push(format!("Moderate payback period ({payback:.1} years)"));
    } else {
        recs.push(format!("Long payback period ({payback:.1} years)"));
    }

    if pi > dec!(1.2) {
        recs.push(format!("High profitability index ({pi:.2})"));
    } else if pi > Decimal::ONE {
        recs.push(format!("Acceptable profitability index ({pi:.2})"));
    } else {
        recs.push(format!("Insufficient profitability index ({pi:.2})"));
    }

    recs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn approx_eq(a: Decimal, b: Decimal, tol: Decimal) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_uniform_flows_by_default() {
        let out = evaluate_investment(&InvestmentInput::default())
            .unwrap()
            .result;
        assert_eq!(out.discounted_flows.len(), 5);
        assert!(out
            .discounted_flows
            .iter()
            .all(|f| f.gross_amount == dec!(200000)));
        // 200k annuity over 5 years at 10% = 758,157.35
        assert!(approx_eq(out.npv, dec!(-241842.65), dec!(0.01)));
        assert!(!out.decision.npv_positive);
    }

    #[test]
    fn test_npv_matches_discounted_sum() {
        let input = InvestmentInput {
            cash_flows: vec![dec!(300000), dec!(400000), dec!(500000)],
            ..InvestmentInput::default()
        };
        let out = evaluate_investment(&input).unwrap().result;
        let pv: Decimal = out.discounted_flows.iter().map(|f| f.present_value).sum();
        assert_eq!(out.npv, pv - dec!(1000000));
        assert_eq!(out.discounted_flows[2].period, 3);
    }

    #[test]
    fn test_irr_and_decision() {
        let input = InvestmentInput {
            cash_flows: vec![dec!(300000); 5],
            ..InvestmentInput::default()
        };
        let out = evaluate_investment(&input).unwrap().result;
        let irr = out.irr.unwrap();
        assert!(approx_eq(irr, dec!(0.1524), dec!(0.001)));
        assert!(out.decision.npv_positive);
        assert!(out.decision.irr_exceeds_discount_rate);
        assert!(out.decision.profitability_index_acceptable);
    }

    #[test]
    fn test_payback_periods() {
        let input = InvestmentInput {
            cash_flows: vec![dec!(400000); 4],
            ..InvestmentInput::default()
        };
        let out = evaluate_investment(&input).unwrap().result;
        assert_eq!(out.payback_period, dec!(2.5));
        assert!(out.discounted_payback_period > out.payback_period);
        assert!(out.discounted_payback_period < dec!(4));
    }

    #[test]
    fn test_profitability_index() {
        let out = evaluate_investment(&InvestmentInput::default())
            .unwrap()
            .result;
        assert!(approx_eq(
            out.profitability_index,
            (out.npv + dec!(1000000)) / dec!(1000000),
            dec!(0.0000001)
        ));
    }

    #[test]
    fn test_degenerate_empty_stream() {
        let input = InvestmentInput {
            project_life: 0,
            ..InvestmentInput::default()
        };
        let out = evaluate_investment(&input).unwrap().result;
        assert_eq!(out.npv, dec!(-1000000));
        assert!(out.irr.is_none());
        assert_eq!(out.payback_period, Decimal::ZERO);
        assert_eq!(out.discounted_payback_period, Decimal::ZERO);
        assert!(!out.decision.irr_exceeds_discount_rate);
    }

    #[test]
    fn test_no_sign_change_gives_absent_irr() {
        let input = InvestmentInput {
            cash_flows: vec![dec!(-100), dec!(-100)],
            ..InvestmentInput::default()
        };
        let result = evaluate_investment(&input).unwrap();
        assert!(result.result.irr.is_none());
        assert!(!result.result.decision.irr_exceeds_discount_rate);
    }

    #[test]
    fn test_invalid_initial_investment() {
        let input = InvestmentInput {
            initial_investment: Decimal::ZERO,
            ..InvestmentInput::default()
        };
        match evaluate_investment(&input).unwrap_err() {
            FincashError::InvalidInput { field, .. } => assert_eq!(field, "initial_investment"),
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_discount_rate_sensitivity() {
        let out = evaluate_investment(&InvestmentInput::default())
            .unwrap()
            .result;
        let points = &out.sensitivity.points;
        assert_eq!(points.len(), 5);
        assert_eq!(points[2].change, Decimal::ZERO);
        // NPV falls as the rate rises
        assert!(points[0].output > points[4].output);
    }

    #[test]
    fn test_warns_when_only_discounted_flows_fall_short() {
        // 1,100 undiscounted, about 943 discounted at 10%
        let input = InvestmentInput {
            initial_investment: dec!(1000),
            cash_flows: vec![dec!(500), dec!(500), dec!(100)],
            discount_rate: dec!(0.10),
            ..InvestmentInput::default()
        };
        let result = evaluate_investment(&input).unwrap();
        assert!(!result
            .warnings
            .iter()
            .any(|w| w.starts_with("Cash flows never recover")));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.starts_with("Discounted cash flows never recover")));
        assert_eq!(result.result.discounted_payback_period, dec!(3));
        assert!(result.result.payback_period < dec!(3));
    }

    #[test]
    fn test_oversized_cash_flow_rejected() {
        let input = InvestmentInput {
            cash_flows: vec![dec!(100), dec!(50000000000000000000000000000)],
            ..InvestmentInput::default()
        };
        match evaluate_investment(&input).unwrap_err() {
            FincashError::InvalidInput { field, .. } => assert_eq!(field, "cash_flows"),
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }
}
