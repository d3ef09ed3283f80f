//! Name-based dispatch over the six models: parameters arrive as a JSON
//! mapping, are deserialized into the model's typed input (missing keys take
//! defaults) and the result envelope is returned as JSON.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::capital_budgeting::investment::{evaluate_investment, InvestmentInput};
use crate::derivatives::options::{price_option, OptionInput};
use crate::error::FincashError;
use crate::fixed_income::bonds::{price_bond, BondInput};
use crate::lending::amortization::{calculate_loan, LoanInput};
use crate::ratios::analysis::{analyze_ratios, RatioInput};
use crate::types::ComputationOutput;
use crate::valuation::dcf::{calculate_dcf, DcfInput};
use crate::FincashResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Dcf,
    InvestmentBudgeting,
    LoanAmortization,
    BondPricing,
    BlackScholes,
    FinancialRatios,
}

impl ModelKind {
    pub const ALL: [ModelKind; 6] = [
        ModelKind::Dcf,
        ModelKind::InvestmentBudgeting,
        ModelKind::LoanAmortization,
        ModelKind::BondPricing,
        ModelKind::BlackScholes,
        ModelKind::FinancialRatios,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Dcf => "dcf",
            ModelKind::InvestmentBudgeting => "investment_budgeting",
            ModelKind::LoanAmortization => "loan_amortization",
            ModelKind::BondPricing => "bond_pricing",
            ModelKind::BlackScholes => "black_scholes",
            ModelKind::FinancialRatios => "financial_ratios",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = FincashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| FincashError::InvalidInput {
                field: "model_kind".into(),
                reason: format!("Unknown model '{s}'"),
            })
    }
}

/// Catalog entry describing one model and the parameters it reads.
#[derive(Debug, Clone, Serialize)]
pub struct ModelDescriptor {
    pub kind: ModelKind,
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<&'static str>,
}

/// Evaluate `kind` against a parameter mapping. `null` is treated as an
/// empty mapping.
pub fn evaluate(kind: ModelKind, params: &Value) -> FincashResult<Value> {
    debug!(model = %kind, "evaluating model");
    match kind {
        ModelKind::Dcf => run::<DcfInput, _, _>(params, calculate_dcf),
        ModelKind::InvestmentBudgeting => run::<InvestmentInput, _, _>(params, evaluate_investment),
        ModelKind::LoanAmortization => run::<LoanInput, _, _>(params, calculate_loan),
        ModelKind::BondPricing => run::<BondInput, _, _>(params, price_bond),
        ModelKind::BlackScholes => run::<OptionInput, _, _>(params, price_option),
        ModelKind::FinancialRatios => run::<RatioInput, _, _>(params, analyze_ratios),
    }
}

/// Deserialize a parameter mapping into a model's typed input.
pub fn parse_params<I: DeserializeOwned>(params: &Value) -> FincashResult<I> {
    let mapping = if params.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        params.clone()
    };
    serde_json::from_value(mapping).map_err(|e| FincashError::InvalidInput {
        field: "parameters".into(),
        reason: e.to_string(),
    })
}

fn run<I, O, F>(params: &Value, compute: F) -> FincashResult<Value>
where
    I: DeserializeOwned,
    O: Serialize,
    F: Fn(&I) -> FincashResult<ComputationOutput<O>>,
{
    let input: I = parse_params(params)?;
    let output = compute(&input)?;
    Ok(serde_json::to_value(output)?)
}

/// The models this engine can evaluate.
pub fn available_models() -> Vec<ModelDescriptor> {
    ModelKind::ALL.into_iter().map(describe).collect()
}

fn describe(kind: ModelKind) -> ModelDescriptor {
    let (name, description, parameters) = match kind {
        ModelKind::Dcf => (
            "Discounted cash flow (DCF)",
            "Enterprise valuation from discounted projected free cash flows",
            vec![
                "initial_revenue",
                "growth_rate",
                "discount_rate",
                "projection_years",
                "terminal_growth",
                "ebitda_margin",
                "tax_rate",
                "capex_rate",
                "working_capital_rate",
            ],
        ),
        ModelKind::InvestmentBudgeting => (
            "Capital investment budgeting",
            "Profitability of a capital project: NPV, IRR, payback, profitability index",
            vec![
                "initial_investment",
                "cash_flows",
                "discount_rate",
                "project_life",
                "uniform_cash_flow",
            ],
        ),
        ModelKind::LoanAmortization => (
            "Loan amortization",
            "Payment schedule under constant, linear or in-fine repayment",
            vec!["principal", "annual_rate", "duration_months", "amortization_type"],
        ),
        ModelKind::BondPricing => (
            "Bond pricing",
            "Price, duration, convexity and yield to maturity of a fixed-coupon bond",
            vec![
                "face_value",
                "coupon_rate",
                "market_rate",
                "years_to_maturity",
                "frequency",
                "current_price",
            ],
        ),
        ModelKind::BlackScholes => (
            "Black-Scholes",
            "European option price and Greeks",
            vec![
                "spot_price",
                "strike_price",
                "time_to_expiry",
                "risk_free_rate",
                "volatility",
                "option_type",
            ],
        ),
        ModelKind::FinancialRatios => (
            "Financial ratio analysis",
            "Liquidity, activity, leverage and profitability ratios with a health score",
            vec![
                "total_assets",
                "current_assets",
                "cash",
                "inventory",
                "receivables",
                "total_liabilities",
                "current_liabilities",
                "long_term_debt",
                "revenue",
                "gross_profit",
                "operating_profit",
                "net_income",
                "interest_expense",
            ],
        ),
    };
    ModelDescriptor {
        kind,
        name,
        description,
        parameters,
    }
}
