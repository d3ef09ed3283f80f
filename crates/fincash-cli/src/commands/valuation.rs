use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use fincash_core::engine::parse_params;
use fincash_core::valuation::dcf::{calculate_dcf, DcfInput};

use crate::input;

/// Arguments for DCF valuation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct DcfArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Year 0 revenue
    #[arg(long, alias = "revenue")]
    pub initial_revenue: Option<Decimal>,

    /// Annual revenue growth rate (e.g. 0.05 for 5%)
    #[arg(long)]
    pub growth_rate: Option<Decimal>,

    /// Discount rate (WACC)
    #[arg(long)]
    pub discount_rate: Option<Decimal>,

    /// Number of explicit projection years
    #[arg(long)]
    pub years: Option<u32>,

    /// Terminal (perpetual) growth rate
    #[arg(long)]
    pub terminal_growth: Option<Decimal>,

    /// EBITDA margin
    #[arg(long)]
    pub ebitda_margin: Option<Decimal>,

    /// Tax rate on positive EBIT
    #[arg(long)]
    pub tax_rate: Option<Decimal>,

    /// Capex as a fraction of revenue
    #[arg(long)]
    pub capex_rate: Option<Decimal>,

    /// Working-capital intensity
    #[arg(long)]
    pub working_capital_rate: Option<Decimal>,
}

impl DcfArgs {
    fn to_input(&self) -> DcfInput {
        let defaults = DcfInput::default();
        DcfInput {
            initial_revenue: self.initial_revenue.unwrap_or(defaults.initial_revenue),
            growth_rate: self.growth_rate.unwrap_or(defaults.growth_rate),
            discount_rate: self.discount_rate.unwrap_or(defaults.discount_rate),
            projection_years: self.years.unwrap_or(defaults.projection_years),
            terminal_growth: self.terminal_growth.unwrap_or(defaults.terminal_growth),
            ebitda_margin: self.ebitda_margin.unwrap_or(defaults.ebitda_margin),
            tax_rate: self.tax_rate.unwrap_or(defaults.tax_rate),
            capex_rate: self.capex_rate.unwrap_or(defaults.capex_rate),
            working_capital_rate: self
                .working_capital_rate
                .unwrap_or(defaults.working_capital_rate),
        }
    }
}

pub fn run_dcf(args: DcfArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let dcf_input: DcfInput = match input::read_params(args.input.as_deref())? {
        Some(params) => parse_params(&params)?,
        None => args.to_input(),
    };

    let result = calculate_dcf(&dcf_input)?;
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
        args: DcfArgs,
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = TestCli::try_parse_from([
            "dcf",
            "--initial-revenue",
            "2500000",
            "--growth-rate",
            "-0.02",
            "--years",
            "8",
        ])
        .unwrap();
        let input = cli.args.to_input();
        assert_eq!(input.initial_revenue, dec!(2500000));
        assert_eq!(input.growth_rate, dec!(-0.02));
        assert_eq!(input.projection_years, 8);
        assert_eq!(input.discount_rate, DcfInput::default().discount_rate);
    }
}
