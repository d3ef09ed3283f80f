use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::warn;

use crate::error::FincashError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate, Years};
use crate::FincashResult;

const MAX_YTM_ITERATIONS: u32 = 50;
const YTM_EPSILON: Decimal = dec!(0.0000001);
const MAX_PERIODS: u32 = 1200;
const COUPON_SCHEDULE_ROWS: u32 = 10;
const VALID_FREQUENCIES: [u32; 4] = [1, 2, 4, 12];
// Input bounds keeping cash-flow sums inside the Decimal range
const MAX_FACE_VALUE: Decimal = dec!(1000000000000000);
const MAX_RATE: Decimal = dec!(10);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Fixed-coupon bullet bond priced off a flat market rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BondInput {
    pub face_value: Money,
    /// Annual coupon rate
    pub coupon_rate: Rate,
    /// Annual market yield used for discounting
    pub market_rate: Rate,
    pub years_to_maturity: Years,
    /// Coupons per year: 1, 2, 4 or 12
    pub frequency: u32,
    /// Observed price for the YTM solve; defaults to the computed price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<Money>,
}

impl Default for BondInput {
    fn default() -> Self {
        Self {
            face_value: dec!(1000),
            coupon_rate: dec!(0.05),
            market_rate: dec!(0.06),
            years_to_maturity: dec!(5),
            frequency: 2,
            current_price: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponPayment {
    pub period: u32,
    pub time_in_years: Years,
    pub coupon: Money,
    pub discount_factor: Rate,
    pub present_value: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondOutput {
    pub price: Money,
    pub face_value: Money,
    pub pv_coupons: Money,
    pub pv_principal: Money,
    /// Macaulay duration in years
    pub duration: Decimal,
    pub modified_duration: Decimal,
    pub convexity: Decimal,
    pub yield_to_maturity: Rate,
    /// True when the solver failed and the coupon rate was substituted
    pub ytm_is_approximate: bool,
    /// (price / face - 1) * 100
    pub premium_discount_pct: Decimal,
    /// "premium", "discount" or "par"
    pub price_classification: String,
    /// Price change for a 1% parallel rate rise (duration approximation)
    pub rate_risk_1pct: Money,
    /// First payments of the coupon stream
    pub coupon_schedule: Vec<CouponPayment>,
    pub recommendations: Vec<String>,
}

/// Single-pass aggregates over the bond's cash flows at one period rate.
struct CashFlowAnalytics {
    pv_coupons: Money,
    pv_principal: Money,
    /// Σ (k/m) · PV(CF_k)
    weighted_time: Decimal,
    /// Σ k(k+1)/m² · PV(CF_k)
    convexity_sum: Decimal,
}

impl CashFlowAnalytics {
    fn price(&self) -> Money {
        self.pv_coupons + self.pv_principal
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Price a bond and report duration, convexity and yield to maturity.
pub fn price_bond(input: &BondInput) -> FincashResult<ComputationOutput<BondOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let periods = validate_bond_input(input)?;
    let freq = Decimal::from(input.frequency);
    // Bounded by MAX_RATE * MAX_FACE_VALUE
    let coupon = input.coupon_rate * input.face_value / freq;
    let period_rate = input.market_rate / freq;

    let analytics = analyze_cash_flows(coupon, input.face_value, period_rate, periods, freq)
        .ok_or_else(|| FincashError::DivisionByZero {
            context: "bond pricing: discount factors out of range".into(),
        })?;
    let price = analytics.price();
    if price <= Decimal::ZERO {
        return Err(FincashError::DivisionByZero {
            context: "bond pricing: price is zero".into(),
        });
    }

    let out_of_range = || FincashError::InvalidInput {
        field: "market_rate".into(),
        reason: "Bond analytics are out of range for this market rate".into(),
    };
    let one_plus_i = Decimal::ONE + period_rate;
    let duration = analytics
        .weighted_time
        .checked_div(price)
        .ok_or_else(out_of_range)?;
    let modified_duration = duration / one_plus_i;
    let convexity = price
        .checked_mul(one_plus_i * one_plus_i)
        .and_then(|denominator| analytics.convexity_sum.checked_div(denominator))
        .ok_or_else(out_of_range)?;

    let target_price = input.current_price.unwrap_or(price);
    let (yield_to_maturity, ytm_is_approximate) =
        match solve_ytm(coupon, input.face_value, periods, freq, target_price, input.coupon_rate) {
            Some(y) if y >= Decimal::ZERO && y <= Decimal::ONE => (y, false),
            other => {
                warn!(solved = ?other, coupon_rate = %input.coupon_rate, "YTM falling back to coupon rate");
                warnings.push(format!(
                    "Yield to maturity did not converge inside [0, 1]; coupon rate {} reported as an approximation",
                    input.coupon_rate
                ));
                (input.coupon_rate, true)
            }
        };

    let premium_discount_pct = price
        .checked_div(input.face_value)
        .and_then(|ratio| (ratio - Decimal::ONE).checked_mul(dec!(100)))
        .ok_or_else(out_of_range)?;
    // Compare at micro-unit precision so par bonds classify as par
    let rounded_price = price.round_dp(6);
    let price_classification = if rounded_price > input.face_value {
        "premium"
    } else if rounded_price < input.face_value {
        "discount"
    } else {
        "par"
    }
    .to_string();

    let rate_risk_1pct = (-duration * dec!(0.01))
        .checked_mul(price)
        .ok_or_else(out_of_range)?;
    let coupon_schedule = build_coupon_schedule(coupon, period_rate, periods, freq);

    let recommendations = build_recommendations(
        premium_discount_pct,
        duration,
        yield_to_maturity,
        input.market_rate,
    );

    let output = BondOutput {
        price,
        face_value: input.face_value,
        pv_coupons: analytics.pv_coupons,
        pv_principal: analytics.pv_principal,
        duration,
        modified_duration,
        convexity,
        yield_to_maturity,
        ytm_is_approximate,
        premium_discount_pct,
        price_classification,
        rate_risk_1pct,
        coupon_schedule,
        recommendations,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Bond pricing (flat yield, Macaulay duration, Newton-Raphson YTM)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Validate inputs and return the number of coupon periods.
fn validate_bond_input(input: &BondInput) -> FincashResult<u32> {
    if input.face_value <= Decimal::ZERO {
        return Err(FincashError::InvalidInput {
            field: "face_value".into(),
            reason: "Face value must be positive".into(),
        });
    }
    if input.face_value > MAX_FACE_VALUE {
        return Err(FincashError::InvalidInput {
            field: "face_value".into(),
            reason: format!("Face value must not exceed {MAX_FACE_VALUE}"),
        });
    }
    if input.coupon_rate < Decimal::ZERO {
        return Err(FincashError::InvalidInput {
            field: "coupon_rate".into(),
            reason: "Coupon rate cannot be negative".into(),
        });
    }
    if input.coupon_rate > MAX_RATE {
        return Err(FincashError::InvalidInput {
            field: "coupon_rate".into(),
            reason: format!("Coupon rate must not exceed {MAX_RATE}"),
        });
    }
    if input.market_rate > MAX_RATE {
        return Err(FincashError::InvalidInput {
            field: "market_rate".into(),
            reason: format!("Market rate must not exceed {MAX_RATE}"),
        });
    }
    if !VALID_FREQUENCIES.contains(&input.frequency) {
        return Err(FincashError::InvalidInput {
            field: "frequency".into(),
            reason: "Coupon frequency must be 1, 2, 4, or 12".into(),
        });
    }
    if input.years_to_maturity <= Decimal::ZERO {
        return Err(FincashError::InvalidInput {
            field: "years_to_maturity".into(),
            reason: "Years to maturity must be positive".into(),
        });
    }

    let freq = Decimal::from(input.frequency);
    let periods = (input.years_to_maturity * freq)
        .floor()
        .to_u32()
        .filter(|n| (1..=MAX_PERIODS).contains(n))
        .ok_or_else(|| FincashError::InvalidInput {
            field: "years_to_maturity".into(),
            reason: format!("Maturity must span between 1 and {MAX_PERIODS} coupon periods"),
        })?;

    if input.market_rate / freq <= dec!(-1) {
        return Err(FincashError::InvalidInput {
            field: "market_rate".into(),
            reason: "Market rate per period must be greater than -100%".into(),
        });
    }
    if let Some(p) = input.current_price {
        if p <= Decimal::ZERO {
            return Err(FincashError::InvalidInput {
                field: "current_price".into(),
                reason: "Current price must be positive".into(),
            });
        }
    }

    Ok(periods)
}

/// Discount every cash flow at `period_rate`. Returns `None` when a discount
/// factor leaves the Decimal range.
fn analyze_cash_flows(
    coupon: Money,
    face_value: Money,
    period_rate: Rate,
    periods: u32,
    freq: Decimal,
) -> Option<CashFlowAnalytics> {
    let one_plus_i = Decimal::ONE + period_rate;
    if one_plus_i <= Decimal::ZERO {
        return None;
    }

    let freq_sq = freq * freq;
    let mut df = Decimal::ONE;
    let mut pv_coupons = Decimal::ZERO;
    let mut weighted_time = Decimal::ZERO;
    let mut convexity_sum = Decimal::ZERO;

    for k in 1..=periods {
        df = df.checked_div(one_plus_i)?;
        let k_dec = Decimal::from(k);
        let cf = if k == periods {
            coupon.checked_add(face_value)?
        } else {
            coupon
        };
        let pv_cf = cf.checked_mul(df)?;

        pv_coupons = pv_coupons.checked_add(coupon.checked_mul(df)?)?;
        weighted_time = weighted_time.checked_add((k_dec / freq).checked_mul(pv_cf)?)?;
        convexity_sum = convexity_sum
            .checked_add((k_dec * (k_dec + Decimal::ONE) / freq_sq).checked_mul(pv_cf)?)?;
    }

    let pv_principal = face_value.checked_mul(df)?;
    // price() adds the two legs
    pv_coupons.checked_add(pv_principal)?;

    Some(CashFlowAnalytics {
        pv_coupons,
        pv_principal,
        weighted_time,
        convexity_sum,
    })
}

/// Newton-Raphson on the annual yield. dP/dy = -weighted_time / (1 + y/m).
fn solve_ytm(
    coupon: Money,
    face_value: Money,
    periods: u32,
    freq: Decimal,
    target_price: Money,
    guess: Rate,
) -> Option<Rate> {
    let mut y = guess;

    for _ in 0..MAX_YTM_ITERATIONS {
        let period_rate = y / freq;
        let analytics = analyze_cash_flows(coupon, face_value, period_rate, periods, freq)?;
        let f = analytics.price() - target_price;

        if f.abs() < YTM_EPSILON {
            return Some(y);
        }

        let derivative = -analytics.weighted_time / (Decimal::ONE + period_rate);
        if derivative.is_zero() {
            return None;
        }

        y = y.checked_sub(f.checked_div(derivative)?)?;

        // Keep the iterate in a sane band
        if y < dec!(-0.5) {
            y = dec!(-0.5);
        } else if y > dec!(2.0) {
            y = dec!(2.0);
        }
    }

    None
}

fn build_coupon_schedule(
    coupon: Money,
    period_rate: Rate,
    periods: u32,
    freq: Decimal,
) -> Vec<CouponPayment> {
    let one_plus_i = Decimal::ONE + period_rate;
    let mut df = Decimal::ONE;
    let mut schedule = Vec::new();

    for period in 1..=periods.min(COUPON_SCHEDULE_ROWS) {
        df /= one_plus_i;
        schedule.push(CouponPayment {
            period,
            time_in_years: Decimal::from(period) / freq,
            coupon,
            discount_factor: df,
            present_value: coupon * df,
        });
    }

    schedule
}

fn build_recommendations(
    premium_discount_pct: Decimal,
    duration: Decimal,
    ytm: Rate,
    market_rate: Rate,
) -> Vec<String> {
    let mut recs = Vec::new();

    if premium_discount_pct > dec!(5) {
        recs.push(format!(
            "Premium bond ({premium_discount_pct:.1}%): coupon rate above market rate"
        ));
    } else if premium_discount_pct < dec!(-5) {
        recs.push(format!(
            "Discount bond ({premium_discount_pct:.1}%): coupon rate below market rate"
        ));
    } else {
        recs.push("Bond trades close to par".into());
    }

    if duration > dec!(7) {
        recs.push(format!(
            "High duration ({duration:.1}): strong sensitivity to interest rates"
        ));
    } else if duration < dec!(3) {
        recs.push(format!(
            "Low duration ({duration:.1}): limited sensitivity to interest rates"
        ));
    }

    let spread = (ytm - market_rate) * dec!(100);
    if spread.abs() > dec!(0.5) {
        recs.push(format!(
            "Yield spread vs market: {spread:.2} percentage points"
        ));
    }

    recs.push(format!("Yield to maturity: {:.2}%", ytm * dec!(100)));

    recs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
