use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use fincash_core::engine::parse_params;
use fincash_core::lending::amortization::{
    calculate_loan, compare_amortization_types, AmortizationType, LoanInput,
};

use crate::input;

/// Arguments for a loan amortization schedule
#[derive(Args)]
pub struct LoanArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Amount borrowed
    #[arg(long, alias = "loan-amount")]
    pub principal: Option<Decimal>,

    /// Nominal annual rate (e.g. 0.045 for 4.5%)
    #[arg(long)]
    pub annual_rate: Option<Decimal>,

    /// Duration in months
    #[arg(long, alias = "months")]
    pub duration_months: Option<u32>,

    /// Repayment policy: constant, linear or in-fine
    #[arg(long, value_parser = parse_amortization_type)]
    pub amortization_type: Option<AmortizationType>,
}

/// Arguments for comparing the three repayment policies
#[derive(Args)]
pub struct CompareLoansArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Amount borrowed
    #[arg(long, alias = "loan-amount")]
    pub principal: Option<Decimal>,

    /// Nominal annual rate
    #[arg(long)]
    pub annual_rate: Option<Decimal>,

    /// Duration in months
    #[arg(long, alias = "months")]
    pub duration_months: Option<u32>,
}

fn parse_amortization_type(s: &str) -> Result<AmortizationType, String> {
    match s.to_ascii_lowercase().replace('-', "_").as_str() {
        "constant" => Ok(AmortizationType::Constant),
        "linear" => Ok(AmortizationType::Linear),
        "in_fine" | "infine" | "bullet" => Ok(AmortizationType::InFine),
        other => Err(format!(
            "unknown amortization type '{other}' (expected constant, linear or in-fine)"
        )),
    }
}

impl LoanArgs {
    fn to_input(&self) -> LoanInput {
        let defaults = LoanInput::default();
        LoanInput {
            principal: self.principal.unwrap_or(defaults.principal),
            annual_rate: self.annual_rate.unwrap_or(defaults.annual_rate),
            duration_months: self.duration_months.unwrap_or(defaults.duration_months),
            amortization_type: self
                .amortization_type
                .unwrap_or(defaults.amortization_type),
        }
    }
}

impl CompareLoansArgs {
    fn to_input(&self) -> LoanInput {
        let defaults = LoanInput::default();
        LoanInput {
            principal: self.principal.unwrap_or(defaults.principal),
            annual_rate: self.annual_rate.unwrap_or(defaults.annual_rate),
            duration_months: self.duration_months.unwrap_or(defaults.duration_months),
            ..defaults
        }
    }
}

pub fn run_loan(args: LoanArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let loan_input: LoanInput = match input::read_params(args.input.as_deref())? {
        Some(params) => parse_params(&params)?,
        None => args.to_input(),
    };

    let result = calculate_loan(&loan_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_compare_loans(args: CompareLoansArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let loan_input: LoanInput = match input::read_params(args.input.as_deref())? {
        Some(params) => parse_params(&params)?,
        None => args.to_input(),
    };

    let comparison = compare_amortization_types(
        loan_input.principal,
        loan_input.annual_rate,
        loan_input.duration_months,
    )?;
    Ok(serde_json::json!({ "result": comparison }))
}
