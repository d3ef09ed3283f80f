use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use fincash_core::derivatives::options::{price_option, OptionInput, OptionType};
use fincash_core::engine::parse_params;

use crate::input;

/// Arguments for Black-Scholes option pricing
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct OptionArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Spot price of the underlying
    #[arg(long, alias = "spot")]
    pub spot_price: Option<Decimal>,

    /// Strike price
    #[arg(long, alias = "strike")]
    pub strike_price: Option<Decimal>,

    /// Time to expiry in years
    #[arg(long, alias = "expiry")]
    pub time_to_expiry: Option<Decimal>,

    /// Continuously compounded risk-free rate
    #[arg(long)]
    pub risk_free_rate: Option<Decimal>,

    /// Annualised volatility
    #[arg(long, alias = "sigma")]
    pub volatility: Option<Decimal>,

    /// Put instead of call
    #[arg(long)]
    pub put: bool,
}

impl OptionArgs {
    fn to_input(&self) -> OptionInput {
        let defaults = OptionInput::default();
        OptionInput {
            spot_price: self.spot_price.unwrap_or(defaults.spot_price),
            strike_price: self.strike_price.unwrap_or(defaults.strike_price),
            time_to_expiry: self.time_to_expiry.unwrap_or(defaults.time_to_expiry),
            risk_free_rate: self.risk_free_rate.unwrap_or(defaults.risk_free_rate),
            volatility: self.volatility.unwrap_or(defaults.volatility),
            option_type: if self.put {
                OptionType::Put
            } else {
                OptionType::Call
            },
        }
    }
}

pub fn run_option(args: OptionArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let option_input: OptionInput = match input::read_params(args.input.as_deref())? {
        Some(params) => parse_params(&params)?,
        None => args.to_input(),
    };

    let result = price_option(&option_input)?;
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
        args: OptionArgs,
    }

    #[test]
    fn test_put_flag_and_aliases() {
        let cli = TestCli::try_parse_from([
            "option", "--spot", "42", "--strike", "40", "--sigma", "0.25", "--put",
        ])
        .unwrap();
        let input = cli.args.to_input();
        assert_eq!(input.spot_price, dec!(42));
        assert_eq!(input.strike_price, dec!(40));
        assert_eq!(input.volatility, dec!(0.25));
        assert_eq!(input.option_type, OptionType::Put);
    }
}
