use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use fincash_core::engine::parse_params;
use fincash_core::ratios::analysis::{analyze_ratios, RatioInput};

use crate::input;

/// Arguments for financial ratio analysis. Omitted amounts use the built-in
/// sample statement.
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct RatiosArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    #[arg(long)]
    pub total_assets: Option<Decimal>,

    #[arg(long)]
    pub current_assets: Option<Decimal>,

    #[arg(long)]
    pub cash: Option<Decimal>,

    #[arg(long)]
    pub inventory: Option<Decimal>,

    #[arg(long)]
    pub receivables: Option<Decimal>,

    #[arg(long)]
    pub total_liabilities: Option<Decimal>,

    #[arg(long)]
    pub current_liabilities: Option<Decimal>,

    #[arg(long)]
    pub long_term_debt: Option<Decimal>,

    #[arg(long)]
    pub revenue: Option<Decimal>,

    #[arg(long)]
    pub gross_profit: Option<Decimal>,

    #[arg(long)]
    pub operating_profit: Option<Decimal>,

    /// Net income (may be negative)
    #[arg(long)]
    pub net_income: Option<Decimal>,

    #[arg(long)]
    pub interest_expense: Option<Decimal>,
}

impl RatiosArgs {
    fn to_input(&self) -> RatioInput {
        let d = RatioInput::default();
        RatioInput {
            total_assets: self.total_assets.unwrap_or(d.total_assets),
            current_assets: self.current_assets.unwrap_or(d.current_assets),
            cash: self.cash.unwrap_or(d.cash),
            inventory: self.inventory.unwrap_or(d.inventory),
            receivables: self.receivables.unwrap_or(d.receivables),
            total_liabilities: self.total_liabilities.unwrap_or(d.total_liabilities),
            current_liabilities: self.current_liabilities.unwrap_or(d.current_liabilities),
            long_term_debt: self.long_term_debt.unwrap_or(d.long_term_debt),
            revenue: self.revenue.unwrap_or(d.revenue),
            gross_profit: self.gross_profit.unwrap_or(d.gross_profit),
            operating_profit: self.operating_profit.unwrap_or(d.operating_profit),
            net_income: self.net_income.unwrap_or(d.net_income),
            interest_expense: self.interest_expense.unwrap_or(d.interest_expense),
        }
    }
}

pub fn run_ratios(args: RatiosArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let ratio_input: RatioInput = match input::read_params(args.input.as_deref())? {
        Some(params) => parse_params(&params)?,
        None => args.to_input(),
    };

    let result = analyze_ratios(&ratio_input)?;
    Ok(serde_json::to_value(result)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rust_decimal_macros::dec;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: RatiosArgs,
    }

    #[test]
    fn test_negative_net_income_flag() {
        let cli = TestCli::try_parse_from(["ratios", "--net-income", "-50000"]).unwrap();
        let input = cli.args.to_input();
        assert_eq!(input.net_income, dec!(-50000));
        assert_eq!(input.revenue, RatioInput::default().revenue);
    }
}
