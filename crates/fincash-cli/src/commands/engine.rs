use clap::Args;
use serde_json::Value;

use fincash_core::engine::{available_models, evaluate, ModelKind};

use crate::input;

/// Arguments for evaluating a model by name
#[derive(Args)]
pub struct EvaluateArgs {
    /// Model name: dcf, investment_budgeting, loan_amortization,
    /// bond_pricing, black_scholes or financial_ratios
    pub kind: String,

    /// Path to JSON or YAML parameter file; stdin is read when omitted
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_evaluate(args: EvaluateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let kind: ModelKind = args.kind.parse()?;
    let params = input::read_params(args.input.as_deref())?.unwrap_or(Value::Null);
    Ok(evaluate(kind, &params)?)
}

pub fn run_models() -> Result<Value, Box<dyn std::error::Error>> {
    Ok(serde_json::to_value(available_models())?)
}
