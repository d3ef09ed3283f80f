use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use crate::error::FincashError;
use crate::sensitivity::{scaled_values, sweep, SensitivitySeries};
use crate::types::{with_metadata, ComputationOutput, Money, Rate, Years};
use crate::FincashResult;

/// Spot multipliers for the price sensitivity sweep.
const SPOT_FACTORS: [Decimal; 5] = [dec!(0.90), dec!(0.95), dec!(1.00), dec!(1.05), dec!(1.10)];

/// Volatility multipliers for the vol sensitivity sweep.
const VOL_FACTORS: [Decimal; 5] = [dec!(0.8), dec!(0.9), dec!(1.0), dec!(1.1), dec!(1.2)];

// Input bounds keeping every price and Greek inside the Decimal range
const MAX_PRICE: Decimal = dec!(1000000000000);
const MAX_VOLATILITY: Decimal = dec!(10);
const MAX_EXPIRY: Decimal = dec!(100);
const MAX_RATE: Decimal = dec!(1);
const MIN_MONEYNESS: Decimal = dec!(0.00000000000000000001);
const MAX_MONEYNESS: Decimal = dec!(100000000000000000000);
/// Bound on |r * T|; e^10 keeps discounted strikes well below the Decimal range.
const MAX_RATE_TIME: Decimal = dec!(10);

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    #[default]
    Call,
    Put,
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "call"),
            OptionType::Put => write!(f, "put"),
        }
    }
}

/// European option on a non-dividend-paying underlying.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionInput {
    #[serde(alias = "S")]
    pub spot_price: Money,
    #[serde(alias = "K")]
    pub strike_price: Money,
    /// Years to expiry
    #[serde(alias = "T")]
    pub time_to_expiry: Years,
    /// Continuously compounded risk-free rate
    #[serde(alias = "r")]
    pub risk_free_rate: Rate,
    /// Annualised volatility
    #[serde(alias = "sigma")]
    pub volatility: Rate,
    #[serde(alias = "type")]
    pub option_type: OptionType,
}

impl Default for OptionInput {
    fn default() -> Self {
        Self {
            spot_price: dec!(100),
            strike_price: dec!(100),
            time_to_expiry: dec!(1),
            risk_free_rate: dec!(0.05),
            volatility: dec!(0.20),
            option_type: OptionType::Call,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSensitivity {
    /// Price re-evaluated at spot * {0.90 .. 1.10}
    pub spot_price: SensitivitySeries,
    /// Price re-evaluated at sigma * {0.8 .. 1.2}
    pub volatility: SensitivitySeries,
}

/// Price and Greeks. Greeks are per unit change (theta per year, vega per
/// 1.00 of volatility, rho per 1.00 of rate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionOutput {
    pub option_type: OptionType,
    pub price: Money,
    pub delta: Decimal,
    pub gamma: Decimal,
    pub theta: Decimal,
    pub vega: Decimal,
    pub rho: Decimal,
    pub d1: Decimal,
    pub d2: Decimal,
    /// "ITM" or "OTM"
    pub moneyness: String,
    /// Price of the opposite leg implied by put-call parity
    pub parity_price: Money,
    pub sensitivity: OptionSensitivity,
    pub recommendations: Vec<String>,
}

// ---------------------------------------------------------------------------
// Decimal math helpers
// ---------------------------------------------------------------------------

/// Taylor series exp(x) with range reduction exp(x) = exp(x/2)^2 for |x| > 2.
pub(crate) fn exp_decimal(x: Decimal) -> Decimal {
    let two = dec!(2);

    if x > two || x < -two {
        let half = exp_decimal(x / two);
        return half * half;
    }

    let mut sum = Decimal::ONE;
    let mut term = Decimal::ONE;
    for n in 1u32..=25 {
        term = term * x / Decimal::from(n);
        sum += term;
    }
    sum
}

/// Newton's method sqrt, 25 iterations.
pub(crate) fn sqrt_decimal(x: Decimal) -> Decimal {
    if x <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    if x == Decimal::ONE {
        return Decimal::ONE;
    }
    let two = dec!(2);
    let mut guess = x / two;
    if x > dec!(100) {
        guess = dec!(10);
    } else if x < dec!(0.01) {
        guess = dec!(0.1);
    }
    for _ in 0..25 {
        guess = (guess + x / guess) / two;
    }
    guess
}

/// Natural log: Newton on exp(y) = x, 30 iterations. `x` must be positive.
fn ln_decimal(x: Decimal) -> Decimal {
    if x == Decimal::ONE {
        return Decimal::ZERO;
    }

    let e_approx = dec!(2.718281828459045);
    let mut y = if x > dec!(0.5) && x < dec!(2) {
        x - Decimal::ONE
    } else {
        // Count powers of e to get in the ballpark
        let mut approx = Decimal::ZERO;
        let mut v = x;
        if x > Decimal::ONE {
            while v > e_approx {
                v /= e_approx;
                approx += Decimal::ONE;
            }
        } else {
            while v < Decimal::ONE / e_approx {
                v *= e_approx;
                approx -= Decimal::ONE;
            }
        }
        approx + (v - Decimal::ONE)
    };

    for _ in 0..30 {
        let ey = exp_decimal(y);
        if ey.is_zero() {
            break;
        }
        y = y - Decimal::ONE + x / ey;
    }
    y
}

/// Standard normal PDF: exp(-x^2/2) / sqrt(2*pi)
pub(crate) fn norm_pdf(x: Decimal) -> Decimal {
    if x.abs() > dec!(40) {
        return Decimal::ZERO;
    }
    let two_pi = dec!(6.283185307179586);
    let exponent = -(x * x) / dec!(2);
    exp_decimal(exponent) / sqrt_decimal(two_pi)
}

/// Standard normal CDF, Abramowitz & Stegun 26.2.17.
/// Phi(-x) is computed as exactly 1 - Phi(x).
pub(crate) fn norm_cdf(x: Decimal) -> Decimal {
    let b1 = dec!(0.319381530);
    let b2 = dec!(-0.356563782);
    let b3 = dec!(1.781477937);
    let b4 = dec!(-1.821255978);
    let b5 = dec!(1.330274429);
    let p = dec!(0.2316419);

    let abs_x = x.abs();
    let cdf_pos = if abs_x > dec!(40) {
        Decimal::ONE
    } else {
        let t = Decimal::ONE / (Decimal::ONE + p * abs_x);
        let poly = t * (b1 + t * (b2 + t * (b3 + t * (b4 + t * b5))));
        Decimal::ONE - norm_pdf(abs_x) * poly
    };

    if x < Decimal::ZERO {
        Decimal::ONE - cdf_pos
    } else {
        cdf_pos
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_option_input(input: &OptionInput) -> FincashResult<()> {
    if input.spot_price <= Decimal::ZERO {
        return Err(FincashError::InvalidInput {
            field: "spot_price".into(),
            reason: "must be positive".into(),
        });
    }
    if input.strike_price <= Decimal::ZERO {
        return Err(FincashError::InvalidInput {
            field: "strike_price".into(),
            reason: "must be positive".into(),
        });
    }
    if input.time_to_expiry <= Decimal::ZERO {
        return Err(FincashError::InvalidInput {
            field: "time_to_expiry".into(),
            reason: "must be positive".into(),
        });
    }
    if input.volatility <= Decimal::ZERO {
        return Err(FincashError::InvalidInput {
            field: "volatility".into(),
            reason: "must be positive".into(),
        });
    }
    if input.spot_price > MAX_PRICE {
        return Err(FincashError::InvalidInput {
            field: "spot_price".into(),
            reason: format!("must not exceed {MAX_PRICE}"),
        });
    }
    if input.strike_price > MAX_PRICE {
        return Err(FincashError::InvalidInput {
            field: "strike_price".into(),
            reason: format!("must not exceed {MAX_PRICE}"),
        });
    }
    if input.time_to_expiry > MAX_EXPIRY {
        return Err(FincashError::InvalidInput {
            field: "time_to_expiry".into(),
            reason: format!("must not exceed {MAX_EXPIRY} years"),
        });
    }
    if input.volatility > MAX_VOLATILITY {
        return Err(FincashError::InvalidInput {
            field: "volatility".into(),
            reason: format!("must not exceed {MAX_VOLATILITY}"),
        });
    }
    if input.risk_free_rate.abs() > MAX_RATE {
        return Err(FincashError::InvalidInput {
            field: "risk_free_rate".into(),
            reason: format!("|rate| must not exceed {MAX_RATE}"),
        });
    }
    if (input.risk_free_rate * input.time_to_expiry).abs() > MAX_RATE_TIME {
        return Err(FincashError::InvalidInput {
            field: "risk_free_rate".into(),
            reason: format!("|rate * time_to_expiry| must not exceed {MAX_RATE_TIME}"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Black-Scholes internals
// ---------------------------------------------------------------------------

struct BsParams {
    d1: Decimal,
    d2: Decimal,
    sqrt_t: Decimal,
    exp_neg_rt: Decimal,
}

fn compute_bs_params(
    s: Decimal,
    k: Decimal,
    t: Decimal,
    r: Decimal,
    sigma: Decimal,
) -> FincashResult<BsParams> {
    let sqrt_t = sqrt_decimal(t);
    let sigma_sqrt_t = sigma * sqrt_t;
    let moneyness_ratio = s
        .checked_div(k)
        .filter(|ratio| (MIN_MONEYNESS..=MAX_MONEYNESS).contains(ratio))
        .ok_or_else(|| FincashError::InvalidInput {
            field: "strike_price".into(),
            reason: "spot / strike is out of range".into(),
        })?;
    let numerator = ln_decimal(moneyness_ratio) + (r + sigma * sigma / dec!(2)) * t;
    let d1 = numerator
        .checked_div(sigma_sqrt_t)
        .ok_or_else(|| FincashError::InvalidInput {
            field: "volatility".into(),
            reason: "volatility is too small for the given log-moneyness".into(),
        })?;
    let d2 = d1 - sigma_sqrt_t;
    Ok(BsParams {
        d1,
        d2,
        sqrt_t,
        exp_neg_rt: exp_decimal(-r * t),
    })
}

fn bs_price(s: Decimal, k: Decimal, params: &BsParams, option_type: OptionType) -> Decimal {
    match option_type {
        OptionType::Call => s * norm_cdf(params.d1) - k * params.exp_neg_rt * norm_cdf(params.d2),
        OptionType::Put => k * params.exp_neg_rt * norm_cdf(-params.d2) - s * norm_cdf(-params.d1),
    }
}

struct Greeks {
    delta: Decimal,
    gamma: Decimal,
    theta: Decimal,
    vega: Decimal,
    rho: Decimal,
}

fn compute_greeks(
    s: Decimal,
    k: Decimal,
    r: Decimal,
    t: Decimal,
    params: &BsParams,
    option_type: OptionType,
) -> FincashResult<Greeks> {
    let out_of_range = || FincashError::InvalidInput {
        field: "volatility".into(),
        reason: "Greeks are out of range for this volatility and expiry".into(),
    };
    let nd1 = norm_pdf(params.d1);
    let sigma_sqrt_t = params.d1 - params.d2;

    let delta = match option_type {
        OptionType::Call => norm_cdf(params.d1),
        OptionType::Put => -norm_cdf(-params.d1),
    };

    let gamma = if nd1.is_zero() {
        Decimal::ZERO
    } else {
        nd1.checked_div(s * sigma_sqrt_t).ok_or_else(out_of_range)?
    };

    // sigma / (2 sqrt T) == sigma_sqrt_t / (2T)
    let decay = (-s * nd1 * sigma_sqrt_t)
        .checked_div(dec!(2) * t)
        .ok_or_else(out_of_range)?;
    let theta = match option_type {
        OptionType::Call => decay - r * k * params.exp_neg_rt * norm_cdf(params.d2),
        OptionType::Put => decay + r * k * params.exp_neg_rt * norm_cdf(-params.d2),
    };

    let vega = s * nd1 * params.sqrt_t;

    let rho = match option_type {
        OptionType::Call => k * t * params.exp_neg_rt * norm_cdf(params.d2),
        OptionType::Put => -k * t * params.exp_neg_rt * norm_cdf(-params.d2),
    };

    Ok(Greeks {
        delta,
        gamma,
        theta,
        vega,
        rho,
    })
}

/// ITM when the option would pay if exercised now; S == K is OTM.
fn classify_moneyness(s: Decimal, k: Decimal, option_type: OptionType) -> String {
    let in_the_money = match option_type {
        OptionType::Call => s > k,
        OptionType::Put => s < k,
    };
    if in_the_money {
        "ITM".into()
    } else {
        "OTM".into()
    }
}

fn price_only(input: &OptionInput) -> FincashResult<Money> {
    validate_option_input(input)?;
    let params = compute_bs_params(
        input.spot_price,
        input.strike_price,
        input.time_to_expiry,
        input.risk_free_rate,
        input.volatility,
    )?;
    Ok(bs_price(
        input.spot_price,
        input.strike_price,
        &params,
        input.option_type,
    ))
}

fn build_recommendations(input: &OptionInput, price: Money, greeks: &Greeks) -> Vec<String> {
    let mut recs = vec![format!("Theoretical option value: {price:.4}")];

    let abs_delta = greeks.delta.abs();
    if abs_delta > dec!(0.7) {
        recs.push(format!(
            "High delta ({:.3}): the option tracks the underlying closely",
            greeks.delta
        ));
    } else if abs_delta < dec!(0.3) {
        recs.push(format!(
            "Low delta ({:.3}): the option reacts little to the underlying",
            greeks.delta
        ));
    }

    if greeks.gamma > dec!(0.1) {
        recs.push(format!("High gamma ({:.4}): delta is unstable", greeks.gamma));
    }

    if greeks.theta < dec!(-0.05) {
        recs.push(format!(
            "Strongly negative theta ({:.4}): significant time decay",
            greeks.theta
        ));
    }

    let ratio = input.spot_price / input.strike_price;
    let (deep_itm, deep_otm) = match input.option_type {
        OptionType::Call => (ratio > dec!(1.1), ratio < dec!(0.9)),
        OptionType::Put => (ratio < dec!(0.9), ratio > dec!(1.1)),
    };
    if deep_itm {
        recs.push("Option is deep in the money".into());
    } else if deep_otm {
        recs.push("Option is deep out of the money".into());
    } else {
        recs.push("Option is near the money".into());
    }

    recs
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Price a European option with Black-Scholes and report Greeks, moneyness
/// and spot/volatility sensitivities.
pub fn price_option(input: &OptionInput) -> FincashResult<ComputationOutput<OptionOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_option_input(input)?;

    let s = input.spot_price;
    let k = input.strike_price;
    let t = input.time_to_expiry;
    let r = input.risk_free_rate;
    let sigma = input.volatility;

    let params = compute_bs_params(s, k, t, r, sigma)?;
    let price = bs_price(s, k, &params, input.option_type);
    let greeks = compute_greeks(s, k, r, t, &params, input.option_type)?;

    // C - P = S - K e^{-rT}
    let forward_gap = s - k * params.exp_neg_rt;
    let parity_price = match input.option_type {
        OptionType::Call => price - forward_gap,
        OptionType::Put => price + forward_gap,
    };

    let sensitivity = OptionSensitivity {
        spot_price: sweep(
            "spot_price",
            price,
            &scaled_values(s, &SPOT_FACTORS),
            |spot| {
                price_only(&OptionInput {
                    spot_price: spot,
                    ..input.clone()
                })
            },
            &mut warnings,
        ),
        volatility: sweep(
            "volatility",
            price,
            &scaled_values(sigma, &VOL_FACTORS),
            |vol| {
                price_only(&OptionInput {
                    volatility: vol,
                    ..input.clone()
                })
            },
            &mut warnings,
        ),
    };

    let recommendations = build_recommendations(input, price, &greeks);

    let output = OptionOutput {
        option_type: input.option_type,
        price,
        delta: greeks.delta,
        gamma: greeks.gamma,
        theta: greeks.theta,
        vega: greeks.vega,
        rho: greeks.rho,
        d1: params.d1,
        d2: params.d2,
        moneyness: classify_moneyness(s, k, input.option_type),
        parity_price,
        sensitivity,
        recommendations,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Black-Scholes (European, closed-form)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
