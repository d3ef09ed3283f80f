use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::FincashError;
use crate::sensitivity::{shifted_values, sweep, SensitivitySeries, RATE_DELTAS};
use crate::time_value::discount_factor;
use crate::types::{with_metadata, ComputationOutput, Money, Multiple, Rate};
use crate::FincashResult;

/// Depreciation proxy as a share of revenue.
const DEPRECIATION_RATE: Rate = dec!(0.03);

const MAX_PROJECTION_YEARS: u32 = 100;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input parameters for a single-growth-rate FCF DCF valuation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DcfInput {
    /// Year 0 revenue
    pub initial_revenue: Money,
    /// Constant annual revenue growth over the explicit period
    pub growth_rate: Rate,
    /// Discount rate applied to every period and to the terminal value
    pub discount_rate: Rate,
    /// Number of explicit projection years
    pub projection_years: u32,
    /// Perpetual growth after the explicit period (Gordon growth)
    pub terminal_growth: Rate,
    /// EBITDA as a fraction of revenue
    pub ebitda_margin: Rate,
    /// Tax rate applied to positive EBIT only
    pub tax_rate: Rate,
    /// Capital expenditure as a fraction of revenue
    pub capex_rate: Rate,
    /// Working-capital intensity; the yearly change is revenue * rate * growth
    pub working_capital_rate: Rate,
}

impl Default for DcfInput {
    fn default() -> Self {
        Self {
            initial_revenue: dec!(1000000),
            growth_rate: dec!(0.05),
            discount_rate: dec!(0.10),
            projection_years: 5,
            terminal_growth: dec!(0.02),
            ebitda_margin: dec!(0.20),
            tax_rate: dec!(0.30),
            capex_rate: dec!(0.05),
            working_capital_rate: dec!(0.02),
        }
    }
}

/// Projection for a single year of the DCF model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfYearProjection {
    pub period: u32,
    pub revenue: Money,
    pub ebitda: Money,
    pub depreciation: Money,
    pub ebit: Money,
    pub tax: Money,
    pub nopat: Money,
    pub capex: Money,
    pub working_capital_change: Money,
    pub free_cash_flow: Money,
    pub discount_factor: Rate,
    pub present_value: Money,
}

/// Valuation multiples implied by the enterprise value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfKeyRatios {
    /// EV / initial revenue
    pub revenue_multiple: Multiple,
    /// EV / (initial revenue * EBITDA margin)
    pub ebitda_multiple: Multiple,
    /// PV of terminal value as a percentage of EV
    pub terminal_value_share: Rate,
}

/// One-way sweeps of enterprise value over growth and discount rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfSensitivity {
    pub growth_rate: SensitivitySeries,
    pub discount_rate: SensitivitySeries,
}

/// Output of the DCF valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfOutput {
    pub projections: Vec<DcfYearProjection>,
    /// Sum of present values of explicit-period free cash flows
    pub pv_of_flows: Money,
    /// Undiscounted Gordon growth terminal value at year N
    pub terminal_value: Money,
    pub pv_of_terminal_value: Money,
    /// pv_of_flows + pv_of_terminal_value
    pub enterprise_value: Money,
    pub key_ratios: DcfKeyRatios,
    pub sensitivity: DcfSensitivity,
    pub recommendations: Vec<String>,
}

/// Base valuation without sensitivity or commentary.
#[derive(Debug, Clone)]
struct Valuation {
    projections: Vec<DcfYearProjection>,
    pv_of_flows: Money,
    terminal_value: Money,
    pv_of_terminal_value: Money,
    enterprise_value: Money,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run a constant-growth FCF DCF valuation with a Gordon growth terminal value.
pub fn calculate_dcf(input: &DcfInput) -> FincashResult<ComputationOutput<DcfOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_dcf_input(input)?;
    let base = value_enterprise(input)?;

    let key_ratios = compute_key_ratios(input, &base);

    if key_ratios.terminal_value_share > dec!(75) {
        warnings.push(format!(
            "Terminal value represents {:.1}% of enterprise value; consider extending the projection period",
            key_ratios.terminal_value_share
        ));
    }

    let sensitivity = run_sensitivity(input, base.enterprise_value, &mut warnings);
    let recommendations = build_recommendations(&base, &key_ratios);

    let output = DcfOutput {
        projections: base.projections,
        pv_of_flows: base.pv_of_flows,
        terminal_value: base.terminal_value,
        pv_of_terminal_value: base.pv_of_terminal_value,
        enterprise_value: base.enterprise_value,
        key_ratios,
        sensitivity,
        recommendations,
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "FCF DCF (constant growth, Gordon terminal value)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_dcf_input(input: &DcfInput) -> FincashResult<()> {
    if input.projection_years == 0 || input.projection_years > MAX_PROJECTION_YEARS {
        return Err(FincashError::InvalidInput {
            field: "projection_years".into(),
            reason: format!("Projection years must be between 1 and {MAX_PROJECTION_YEARS}"),
        });
    }
    if input.discount_rate <= dec!(-1) {
        return Err(FincashError::InvalidInput {
            field: "discount_rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }
    if input.initial_revenue < Decimal::ZERO {
        return Err(FincashError::InvalidInput {
            field: "initial_revenue".into(),
            reason: "Initial revenue cannot be negative".into(),
        });
    }
    if input.tax_rate < Decimal::ZERO || input.tax_rate > Decimal::ONE {
        return Err(FincashError::InvalidInput {
            field: "tax_rate".into(),
            reason: "Tax rate must be between 0 and 1".into(),
        });
    }
    // Gordon growth needs r > g
    if input.discount_rate <= input.terminal_growth {
        return Err(FincashError::InvalidInput {
            field: "terminal_growth".into(),
            reason: format!(
                "Terminal growth ({}) must be below the discount rate ({})",
                input.terminal_growth, input.discount_rate
            ),
        });
    }
    Ok(())
}

fn value_enterprise(input: &DcfInput) -> FincashResult<Valuation> {
    let projections = build_projections(input)?;

    let pv_of_flows: Money = projections.iter().map(|p| p.present_value).sum();
    let last = projections.last().ok_or_else(|| {
        FincashError::InsufficientData("No projection years generated".into())
    })?;

    let terminal_overflow = || FincashError::InvalidInput {
        field: "terminal_growth".into(),
        reason: format!(
            "Terminal value overflows: spread between discount rate ({}) and terminal growth ({}) is too small",
            input.discount_rate, input.terminal_growth
        ),
    };
    let terminal_fcf = last
        .free_cash_flow
        .checked_mul(Decimal::ONE + input.terminal_growth)
        .ok_or_else(terminal_overflow)?;
    let terminal_value = terminal_fcf
        .checked_div(input.discount_rate - input.terminal_growth)
        .ok_or_else(terminal_overflow)?;
    let pv_of_terminal_value = terminal_value
        .checked_mul(last.discount_factor)
        .ok_or_else(terminal_overflow)?;
    let enterprise_value = pv_of_flows
        .checked_add(pv_of_terminal_value)
        .ok_or_else(terminal_overflow)?;

    Ok(Valuation {
        enterprise_value,
        projections,
        pv_of_flows,
        terminal_value,
        pv_of_terminal_value,
    })
}

fn build_projections(input: &DcfInput) -> FincashResult<Vec<DcfYearProjection>> {
    let mut projections = Vec::with_capacity(input.projection_years as usize);
    let one_plus_g = Decimal::ONE
        .checked_add(input.growth_rate)
        .ok_or_else(|| FincashError::InvalidInput {
            field: "growth_rate".into(),
            reason: "Growth rate is out of range".into(),
        })?;
    let mut revenue = input.initial_revenue;

    for period in 1..=input.projection_years {
        revenue = revenue
            .checked_mul(one_plus_g)
            .ok_or_else(|| FincashError::InvalidInput {
                field: "growth_rate".into(),
                reason: format!("Revenue projection overflows at year {period}"),
            })?;

        let df = discount_factor(input.discount_rate, period)?;
        let row = project_year(input, revenue, df).ok_or_else(|| {
            FincashError::InvalidInput {
                field: "initial_revenue".into(),
                reason: format!("Cash flow projection overflows at year {period}"),
            }
        })?;

        projections.push(DcfYearProjection {
            period,
            revenue,
            ebitda: row.ebitda,
            depreciation: row.depreciation,
            ebit: row.ebit,
            tax: row.tax,
            nopat: row.nopat,
            capex: row.capex,
            working_capital_change: row.working_capital_change,
            free_cash_flow: row.free_cash_flow,
            discount_factor: row.discount_factor,
            present_value: row.present_value,
        });
    }

    Ok(projections)
}

struct YearFlows {
    ebitda: Money,
    depreciation: Money,
    ebit: Money,
    tax: Money,
    nopat: Money,
    capex: Money,
    working_capital_change: Money,
    free_cash_flow: Money,
    discount_factor: Decimal,
    present_value: Money,
}

/// One year's FCF build-up; `None` when any step leaves the Decimal range.
fn project_year(input: &DcfInput, revenue: Money, df: Decimal) -> Option<YearFlows> {
    let ebitda = revenue.checked_mul(input.ebitda_margin)?;
    let depreciation = revenue.checked_mul(DEPRECIATION_RATE)?;
    let ebit = ebitda.checked_sub(depreciation)?;
    let tax = if ebit > Decimal::ZERO {
        ebit.checked_mul(input.tax_rate)?
    } else {
        Decimal::ZERO
    };
    let nopat = ebit.checked_sub(tax)?;
    let capex = revenue.checked_mul(input.capex_rate)?;
    let working_capital_change = revenue
        .checked_mul(input.working_capital_rate)?
        .checked_mul(input.growth_rate)?;

    // FCF = NOPAT + D&A - CapEx - ΔWC
    let free_cash_flow = nopat
        .checked_add(depreciation)?
        .checked_sub(capex)?
        .checked_sub(working_capital_change)?;
    let present_value = free_cash_flow.checked_mul(df)?;

    Some(YearFlows {
        ebitda,
        depreciation,
        ebit,
        tax,
        nopat,
        capex,
        working_capital_change,
        free_cash_flow,
        discount_factor: df,
        present_value,
    })
}

fn compute_key_ratios(input: &DcfInput, base: &Valuation) -> DcfKeyRatios {
    let ev = base.enterprise_value;

    // Multiples that leave the Decimal range are reported as 0
    let revenue_multiple = ev
        .checked_div(input.initial_revenue)
        .unwrap_or(Decimal::ZERO);

    let ebitda_multiple = input
        .initial_revenue
        .checked_mul(input.ebitda_margin)
        .and_then(|base_ebitda| ev.checked_div(base_ebitda))
        .unwrap_or(Decimal::ZERO);

    let terminal_value_share = base
        .pv_of_terminal_value
        .checked_div(ev)
        .and_then(|share| share.checked_mul(dec!(100)))
        .unwrap_or(Decimal::ZERO);

    DcfKeyRatios {
        revenue_multiple,
        ebitda_multiple,
        terminal_value_share,
    }
}

/// Re-run the full valuation at shifted growth and discount rates.
fn run_sensitivity(input: &DcfInput, base_ev: Money, warnings: &mut Vec<String>) -> DcfSensitivity {
    let enterprise_value_at = |modified: DcfInput| -> FincashResult<Money> {
        validate_dcf_input(&modified)?;
        Ok(value_enterprise(&modified)?.enterprise_value)
    };

    let growth_rate = sweep(
        "growth_rate",
        base_ev,
        &shifted_values(input.growth_rate, &RATE_DELTAS),
        |g| {
            enterprise_value_at(DcfInput {
                growth_rate: g,
                ..input.clone()
            })
        },
        warnings,
    );

    let discount_rate = sweep(
        "discount_rate",
        base_ev,
        &shifted_values(input.discount_rate, &RATE_DELTAS),
        |r| {
            enterprise_value_at(DcfInput {
                discount_rate: r,
                ..input.clone()
            })
        },
        warnings,
    );

    DcfSensitivity {
        growth_rate,
        discount_rate,
    }
}

fn build_recommendations(base: &Valuation, key_ratios: &DcfKeyRatios) -> Vec<String> {
    let mut recs = Vec::new();

    recs.push(format!(
        "Enterprise value is estimated at {:.0}",
        base.enterprise_value
    ));

    if key_ratios.terminal_value_share > dec!(70) {
        recs.push(format!(
            "Terminal value accounts for {:.1}% of total value: the valuation is highly sensitive to long-term assumptions",
            key_ratios.terminal_value_share
        ));
    } else {
        recs.push(format!(
            "Terminal value accounts for {:.1}% of total value: balanced split",
            key_ratios.terminal_value_share
        ));
    }

    if let Some(growth) = annualised_fcf_growth(&base.projections) {
        if growth > dec!(0.15) {
            recs.push(
                "Projected free cash flow growth is very optimistic; check its sustainability"
                    .into(),
            );
        } else if growth < Decimal::ZERO {
            recs.push("Free cash flows are projected to decline; investigate the causes".into());
        }
    }

    recs.push("Run a sensitivity analysis on the key assumptions".into());
    recs.push("Cross-check against trading multiples of comparable companies".into());

    recs
}

/// Compound annual growth of FCF from the first to the last projected year.
fn annualised_fcf_growth(projections: &[DcfYearProjection]) -> Option<Rate> {
    if projections.len() < 2 {
        return None;
    }
    let first = projections.first()?.free_cash_flow;
    let last = projections.last()?.free_cash_flow;
    if first <= Decimal::ZERO {
        return None;
    }
    if last <= Decimal::ZERO {
        return Some(dec!(-1));
    }
    let years = Decimal::from(projections.len() as u64 - 1);
    last.checked_div(first)?
        .checked_powd(Decimal::ONE / years)
        .map(|factor| factor - Decimal::ONE)
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
    fn test_default_projection_year_one() {
        let result = calculate_dcf(&DcfInput::default()).unwrap();
        let out = &result.result;
        assert_eq!(out.projections.len(), 5);

        let y1 = &out.projections[0];
        assert_eq!(y1.period, 1);
        // 1,000,000 * 1.05
        assert_eq!(y1.revenue, dec!(1050000));
        assert_eq!(y1.ebitda, dec!(210000));
        assert_eq!(y1.depreciation, dec!(31500));
        assert_eq!(y1.ebit, dec!(178500));
        assert_eq!(y1.tax, dec!(53550));
        assert_eq!(y1.nopat, dec!(124950));
        assert_eq!(y1.capex, dec!(52500));
        assert_eq!(y1.working_capital_change, dec!(1050));
        // 124950 + 31500 - 52500 - 1050
        assert_eq!(y1.free_cash_flow, dec!(102900));
    }

    #[test]
    fn test_enterprise_value_identity() {
        let out = calculate_dcf(&DcfInput::default()).unwrap().result;
        assert_eq!(out.enterprise_value, out.pv_of_flows + out.pv_of_terminal_value);
        let sum: Decimal = out.projections.iter().map(|p| p.present_value).sum();
        assert_eq!(sum, out.pv_of_flows);
    }

    #[test]
    fn test_terminal_value_gordon() {
        let out = calculate_dcf(&DcfInput::default()).unwrap().result;
        let last = out.projections.last().unwrap();
        let expected = last.free_cash_flow * dec!(1.02) / dec!(0.08);
        assert!(approx_eq(out.terminal_value, expected, dec!(0.0001)));
        assert!(approx_eq(
            out.pv_of_terminal_value,
            expected * last.discount_factor,
            dec!(0.0001)
        ));
    }

    #[test]
    fn test_discount_factors_strictly_decrease() {
        let out = calculate_dcf(&DcfInput::default()).unwrap().result;
        for pair in out.projections.windows(2) {
            assert!(pair[1].discount_factor < pair[0].discount_factor);
        }
    }

    #[test]
    fn test_negative_ebit_has_no_tax() {
        let input = DcfInput {
            ebitda_margin: dec!(0.01),
            ..DcfInput::default()
        };
        let out = calculate_dcf(&input).unwrap().result;
        for p in &out.projections {
            assert!(p.ebit < Decimal::ZERO);
            assert_eq!(p.tax, Decimal::ZERO);
        }
    }

    #[test]
    fn test_discount_not_above_terminal_growth_rejected() {
        for (r, g) in [(dec!(0.02), dec!(0.02)), (dec!(0.02), dec!(0.03))] {
            let input = DcfInput {
                discount_rate: r,
                terminal_growth: g,
                ..DcfInput::default()
            };
            match calculate_dcf(&input).unwrap_err() {
                FincashError::InvalidInput { field, .. } => assert_eq!(field, "terminal_growth"),
                other => panic!("Expected InvalidInput, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_zero_projection_years_rejected() {
        let input = DcfInput {
            projection_years: 0,
            ..DcfInput::default()
        };
        match calculate_dcf(&input).unwrap_err() {
            FincashError::InvalidInput { field, .. } => assert_eq!(field, "projection_years"),
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_key_ratios() {
        let out = calculate_dcf(&DcfInput::default()).unwrap().result;
        let kr = &out.key_ratios;
        assert!(approx_eq(
            kr.revenue_multiple,
            out.enterprise_value / dec!(1000000),
            dec!(0.000001)
        ));
        assert!(approx_eq(
            kr.ebitda_multiple,
            out.enterprise_value / dec!(200000),
            dec!(0.000001)
        ));
        assert!(kr.terminal_value_share > dec!(50) && kr.terminal_value_share < dec!(100));
    }

    #[test]
    fn test_sensitivity_has_five_points_with_zero_base_change() {
        let out = calculate_dcf(&DcfInput::default()).unwrap().result;
        assert_eq!(out.sensitivity.growth_rate.points.len(), 5);
        assert_eq!(out.sensitivity.discount_rate.points.len(), 5);
        let mid = &out.sensitivity.discount_rate.points[2];
        assert_eq!(mid.tested_value, dec!(0.10));
        assert_eq!(mid.change, Decimal::ZERO);
        // Higher discount rate, lower value
        let hi = &out.sensitivity.discount_rate.points[4];
        assert!(hi.output < out.enterprise_value);
    }

    #[test]
    fn test_sensitivity_skips_invalid_discount_points() {
        // r - 2% = 2% == g_T and r - 1% = 3% > g_T
        let input = DcfInput {
            discount_rate: dec!(0.04),
            terminal_growth: dec!(0.02),
            ..DcfInput::default()
        };
        let result = calculate_dcf(&input).unwrap();
        assert_eq!(result.result.sensitivity.discount_rate.points.len(), 4);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("discount_rate")));
    }

    #[test]
    fn test_recommendations_present() {
        let out = calculate_dcf(&DcfInput::default()).unwrap().result;
        assert!(out.recommendations[0].starts_with("Enterprise value"));
        assert!(out.recommendations.len() >= 4);
    }

    #[test]
    fn test_deterministic() {
        let a = calculate_dcf(&DcfInput::default()).unwrap().result;
        let b = calculate_dcf(&DcfInput::default()).unwrap().result;
        assert_eq!(a, b);
    }

    #[test]
    fn test_vanishing_terminal_spread_is_rejected() {
        // r - g_T = 1e-25 pushes the terminal value past the Decimal range
        let input = DcfInput {
            terminal_growth: dec!(0.0999999999999999999999999),
            ..DcfInput::default()
        };
        match calculate_dcf(&input).unwrap_err() {
            FincashError::InvalidInput { field, .. } => assert_eq!(field, "terminal_growth"),
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_oversized_margin_is_rejected() {
        let input = DcfInput {
            ebitda_margin: dec!(100000000000000000000000000),
            ..DcfInput::default()
        };
        assert!(matches!(
            calculate_dcf(&input),
            Err(FincashError::InvalidInput { .. })
        ));
    }
}
