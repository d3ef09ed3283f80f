use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::FincashError;
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::FincashResult;

/// Cost of goods sold approximated as 70% of revenue.
const COGS_PROXY: Decimal = dec!(0.7);
const DAYS_PER_YEAR: Decimal = dec!(365);
const POINTS_PER_AREA: u32 = 20;
const SCORED_AREAS: u32 = 5;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Balance-sheet and income-statement scalars. Equity is derived as
/// total_assets - total_liabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatioInput {
    pub total_assets: Money,
    pub current_assets: Money,
    pub cash: Money,
    pub inventory: Money,
    pub receivables: Money,
    pub total_liabilities: Money,
    pub current_liabilities: Money,
    pub long_term_debt: Money,
    pub revenue: Money,
    pub gross_profit: Money,
    pub operating_profit: Money,
    pub net_income: Money,
    pub interest_expense: Money,
}

impl Default for RatioInput {
    fn default() -> Self {
        Self {
            total_assets: dec!(1000000),
            current_assets: dec!(400000),
            cash: dec!(100000),
            inventory: dec!(150000),
            receivables: dec!(150000),
            total_liabilities: dec!(600000),
            current_liabilities: dec!(200000),
            long_term_debt: dec!(400000),
            revenue: dec!(2000000),
            gross_profit: dec!(800000),
            operating_profit: dec!(200000),
            net_income: dec!(100000),
            interest_expense: dec!(50000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityRatios {
    pub current_ratio: Decimal,
    pub quick_ratio: Decimal,
    pub cash_ratio: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRatios {
    pub asset_turnover: Decimal,
    /// Uses 0.7 x revenue as a COGS proxy
    pub inventory_turnover: Decimal,
    pub receivables_turnover: Decimal,
    pub inventory_days: Decimal,
    pub receivables_days: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverageRatios {
    pub debt_to_assets: Decimal,
    pub debt_to_equity: Decimal,
    pub equity_ratio: Decimal,
    pub long_term_debt_to_assets: Decimal,
    /// Operating profit / interest expense
    pub interest_coverage: Decimal,
}

/// Margins and returns as fractions (0.25 = 25%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitabilityRatios {
    pub gross_margin: Decimal,
    pub operating_margin: Decimal,
    pub net_margin: Decimal,
    pub return_on_assets: Decimal,
    pub return_on_equity: Decimal,
    /// net_margin x asset_turnover x (assets / equity)
    pub dupont_roe: Decimal,
}

/// Points earned per scored area, each out of 20.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub liquidity: u32,
    pub leverage: u32,
    pub profitability: u32,
    pub activity: u32,
    pub interest_coverage: u32,
}

impl ScoreBreakdown {
    fn total(&self) -> u32 {
        self.liquidity + self.leverage + self.profitability + self.activity + self.interest_coverage
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioOutput {
    pub liquidity: LiquidityRatios,
    pub activity: ActivityRatios,
    pub leverage: LeverageRatios,
    pub profitability: ProfitabilityRatios,
    pub scores: ScoreBreakdown,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
    /// 0-100 financial health score
    pub overall_score: u32,
}

#[derive(Default)]
struct Findings {
    strengths: Vec<String>,
    weaknesses: Vec<String>,
    recommendations: Vec<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute liquidity, activity, leverage and profitability ratios and score
/// the company's financial health out of 100.
pub fn analyze_ratios(input: &RatioInput) -> FincashResult<ComputationOutput<RatioOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_ratio_input(input)?;

    let equity = input.total_assets - input.total_liabilities;
    if equity <= Decimal::ZERO {
        warnings.push(
            "Equity is not positive; equity-based ratios are reported as 0".into(),
        );
    }

    let liquidity = LiquidityRatios {
        current_ratio: safe_div(input.current_assets, input.current_liabilities),
        quick_ratio: safe_div(input.current_assets - input.inventory, input.current_liabilities),
        cash_ratio: safe_div(input.cash, input.current_liabilities),
    };

    let inventory_turnover = safe_div(input.revenue * COGS_PROXY, input.inventory);
    let receivables_turnover = safe_div(input.revenue, input.receivables);
    let activity = ActivityRatios {
        asset_turnover: safe_div(input.revenue, input.total_assets),
        inventory_turnover,
        receivables_turnover,
        inventory_days: safe_div(DAYS_PER_YEAR, inventory_turnover),
        receivables_days: safe_div(DAYS_PER_YEAR, receivables_turnover),
    };

    let leverage = LeverageRatios {
        debt_to_assets: safe_div(input.total_liabilities, input.total_assets),
        debt_to_equity: safe_div(input.total_liabilities, equity),
        equity_ratio: safe_div(equity, input.total_assets),
        long_term_debt_to_assets: safe_div(input.long_term_debt, input.total_assets),
        interest_coverage: safe_div(input.operating_profit, input.interest_expense),
    };

    let net_margin = safe_div(input.net_income, input.revenue);
    let dupont_roe = if equity > Decimal::ZERO {
        net_margin * activity.asset_turnover * (input.total_assets / equity)
    } else {
        Decimal::ZERO
    };
    let profitability = ProfitabilityRatios {
        gross_margin: safe_div(input.gross_profit, input.revenue),
        operating_margin: safe_div(input.operating_profit, input.revenue),
        net_margin,
        return_on_assets: safe_div(input.net_income, input.total_assets),
        return_on_equity: safe_div(input.net_income, equity),
        dupont_roe,
    };

    let mut findings = Findings::default();
    let scores = score_ratios(&liquidity, &activity, &leverage, &profitability, &mut findings);

    if findings.recommendations.is_empty() {
        findings
            .recommendations
            .push("Maintain the current level of performance".into());
        findings
            .recommendations
            .push("Monitor how the ratios evolve over time".into());
    }

    let max_score = POINTS_PER_AREA * SCORED_AREAS;
    let overall_score = scores.total() * 100 / max_score;

    let output = RatioOutput {
        liquidity,
        activity,
        leverage,
        profitability,
        scores,
        strengths: findings.strengths,
        weaknesses: findings.weaknesses,
        recommendations: findings.recommendations,
        overall_score,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Financial ratio analysis with tiered health score",
        input,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_ratio_input(input: &RatioInput) -> FincashResult<()> {
    let non_negative = [
        ("total_assets", input.total_assets),
        ("current_assets", input.current_assets),
        ("cash", input.cash),
        ("inventory", input.inventory),
        ("receivables", input.receivables),
        ("total_liabilities", input.total_liabilities),
        ("current_liabilities", input.current_liabilities),
        ("long_term_debt", input.long_term_debt),
        ("revenue", input.revenue),
        ("interest_expense", input.interest_expense),
    ];
    for (field, value) in non_negative {
        if value < Decimal::ZERO {
            return Err(FincashError::InvalidInput {
                field: field.into(),
                reason: "cannot be negative".into(),
            });
        }
    }
    Ok(())
}

/// numerator / denominator, or 0 when the denominator is not positive.
fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator <= Decimal::ZERO {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

/// Tiered scoring. Ratios are compared at their reported precision: two
/// decimals, ROE at one decimal of a percent.
fn score_ratios(
    liquidity: &LiquidityRatios,
    activity: &ActivityRatios,
    leverage: &LeverageRatios,
    profitability: &ProfitabilityRatios,
    findings: &mut Findings,
) -> ScoreBreakdown {
    let current_ratio = liquidity.current_ratio.round_dp(2);
    let liquidity_points = if current_ratio >= dec!(1.5) {
        findings
            .strengths
            .push(format!("Excellent current ratio ({current_ratio})"));
        20
    } else if current_ratio >= dec!(1.2) {
        findings
            .strengths
            .push(format!("Good current ratio ({current_ratio})"));
        15
    } else if current_ratio >= Decimal::ONE {
        10
    } else {
        findings
            .weaknesses
            .push(format!("Insufficient current ratio ({current_ratio})"));
        findings
            .recommendations
            .push("Improve cash management".into());
        0
    };

    let debt_ratio = leverage.debt_to_assets.round_dp(2);
    let leverage_points = if debt_ratio <= dec!(0.3) {
        findings
            .strengths
            .push(format!("Low indebtedness ({:.1}%)", debt_ratio * dec!(100)));
        20
    } else if debt_ratio <= dec!(0.6) {
        15
    } else if debt_ratio <= dec!(0.8) {
        10
    } else {
        findings
            .weaknesses
            .push(format!("High indebtedness ({:.1}%)", debt_ratio * dec!(100)));
        findings.recommendations.push("Reduce indebtedness".into());
        0
    };

    let roe_pct = (profitability.return_on_equity * dec!(100)).round_dp(1);
    let roe = roe_pct / dec!(100);
    let profitability_points = if roe >= dec!(0.15) {
        findings
            .strengths
            .push(format!("Excellent return on equity ({roe_pct:.1}%)"));
        20
    } else if roe >= dec!(0.10) {
        findings
            .strengths
            .push(format!("Good return on equity ({roe_pct:.1}%)"));
        15
    } else if roe >= dec!(0.05) {
        10
    } else {
        findings
            .weaknesses
            .push(format!("Weak return on equity ({roe_pct:.1}%)"));
        findings
            .recommendations
            .push("Improve operating profitability".into());
        0
    };

    let asset_turnover = activity.asset_turnover.round_dp(2);
    let activity_points = if asset_turnover >= dec!(1.5) {
        findings
            .strengths
            .push(format!("Excellent asset turnover ({asset_turnover})"));
        20
    } else if asset_turnover >= Decimal::ONE {
        findings
            .strengths
            .push(format!("Good asset turnover ({asset_turnover})"));
        15
    } else if asset_turnover >= dec!(0.5) {
        10
    } else {
        findings
            .weaknesses
            .push(format!("Low asset turnover ({asset_turnover})"));
        findings
            .recommendations
            .push("Make better use of the asset base".into());
        0
    };

    let coverage = leverage.interest_coverage.round_dp(2);
    let coverage_points = if coverage >= dec!(5) {
        findings
            .strengths
            .push(format!("Excellent interest coverage ({coverage:.1})"));
        20
    } else if coverage >= dec!(2.5) {
        findings
            .strengths
            .push(format!("Good interest coverage ({coverage:.1})"));
        15
    } else if coverage >= dec!(1.5) {
        10
    } else {
        findings
            .weaknesses
            .push(format!("Insufficient interest coverage ({coverage:.1})"));
        findings
            .recommendations
            .push("Strengthen debt service capacity".into());
        0
    };

    ScoreBreakdown {
        liquidity: liquidity_points,
        leverage: leverage_points,
        profitability: profitability_points,
        activity: activity_points,
        interest_coverage: coverage_points,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
