use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use fincash_core::engine::parse_params;
use fincash_core::fixed_income::bonds::{price_bond, BondInput};

use crate::input;

/// Arguments for bond pricing
#[derive(Args)]
pub struct BondArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Face (redemption) value
    #[arg(long)]
    pub face_value: Option<Decimal>,

    /// Annual coupon rate
    #[arg(long)]
    pub coupon_rate: Option<Decimal>,

    /// Annual market yield used for discounting
    #[arg(long)]
    pub market_rate: Option<Decimal>,

    /// Years to maturity
    #[arg(long, alias = "years")]
    pub years_to_maturity: Option<Decimal>,

    /// Coupons per year (1, 2, 4 or 12)
    #[arg(long)]
    pub frequency: Option<u32>,

    /// Observed market price for the yield-to-maturity solve
    #[arg(long)]
    pub current_price: Option<Decimal>,
}

impl BondArgs {
    fn to_input(&self) -> BondInput {
        let defaults = BondInput::default();
        BondInput {
            face_value: self.face_value.unwrap_or(defaults.face_value),
            coupon_rate: self.coupon_rate.unwrap_or(defaults.coupon_rate),
            market_rate: self.market_rate.unwrap_or(defaults.market_rate),
            years_to_maturity: self
                .years_to_maturity
                .unwrap_or(defaults.years_to_maturity),
            frequency: self.frequency.unwrap_or(defaults.frequency),
            current_price: self.current_price.or(defaults.current_price),
        }
    }
}

pub fn run_bond(args: BondArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let bond_input: BondInput = match input::read_params(args.input.as_deref())? {
        Some(params) => parse_params(&params)?,
        None => args.to_input(),
    };

    let result = price_bond(&bond_input)?;
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
        args: BondArgs,
    }

    #[test]
    fn test_current_price_is_optional() {
        let cli = TestCli::try_parse_from(["bond", "--frequency", "2"]).unwrap();
        let input = cli.args.to_input();
        assert_eq!(input.frequency, 2);
        assert_eq!(input.current_price, None);

        let cli = TestCli::try_parse_from(["bond", "--current-price", "985.5"]).unwrap();
        assert_eq!(cli.args.to_input().current_price, Some(dec!(985.5)));
    }
}
