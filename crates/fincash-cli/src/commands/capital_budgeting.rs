use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use fincash_core::capital_budgeting::investment::{evaluate_investment, InvestmentInput};
use fincash_core::engine::parse_params;

use crate::input;

/// Arguments for investment budgeting
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct InvestmentArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Initial outlay at t=0
    #[arg(long)]
    pub initial_investment: Option<Decimal>,

    /// Comma-separated cash flows for periods 1..n
    #[arg(long, value_delimiter = ',')]
    pub cash_flows: Vec<Decimal>,

    /// Discount rate
    #[arg(long)]
    pub discount_rate: Option<Decimal>,

    /// Project life, used with --uniform-cash-flow when no flows are given
    #[arg(long)]
    pub project_life: Option<u32>,

    /// Cash flow repeated for every period of the project life
    #[arg(long)]
    pub uniform_cash_flow: Option<Decimal>,
}

impl InvestmentArgs {
    fn to_input(&self) -> InvestmentInput {
        let defaults = InvestmentInput::default();
        InvestmentInput {
            initial_investment: self
                .initial_investment
                .unwrap_or(defaults.initial_investment),
            cash_flows: self.cash_flows.clone(),
            discount_rate: self.discount_rate.unwrap_or(defaults.discount_rate),
            project_life: self.project_life.unwrap_or(defaults.project_life),
            uniform_cash_flow: self.uniform_cash_flow.unwrap_or(defaults.uniform_cash_flow),
        }
    }
}

pub fn run_investment(args: InvestmentArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let investment_input: InvestmentInput = match input::read_params(args.input.as_deref())? {
        Some(params) => parse_params(&params)?,
        None => args.to_input(),
    };

    let result = evaluate_investment(&investment_input)?;
    Ok(serde_json::to_value(result)?)
}
