use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::error::FincashError;
use crate::types::{Money, Rate};
use crate::FincashResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const MAX_IRR_ITERATIONS: u32 = 100;

/// Initial guess used when solving a project IRR.
pub const IRR_INITIAL_GUESS: Rate = dec!(0.10);

/// A root is only accepted when |NPV(r)| falls below this residual.
pub const IRR_MAX_RESIDUAL: Decimal = dec!(0.000001);

/// Admissible IRR domain, exclusive on both ends.
pub const IRR_LOWER_BOUND: Rate = dec!(-0.99);
pub const IRR_UPPER_BOUND: Rate = dec!(1.0);

/// Net Present Value of a series of cash flows. The first flow is at t = 0.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> FincashResult<Money> {
    if rate <= dec!(-1) {
        return Err(FincashError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    let mut result = Decimal::ZERO;
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount.checked_mul(one_plus_r).ok_or_else(|| {
                FincashError::DivisionByZero {
                    context: format!("NPV discount factor overflow at period {t}"),
                }
            })?;
        }
        if discount.is_zero() {
            return Err(FincashError::DivisionByZero {
                context: format!("NPV discount factor at period {t}"),
            });
        }
        result += cf.checked_div(discount).ok_or_else(|| FincashError::DivisionByZero {
            context: format!("NPV present value at period {t}"),
        })?;
    }

    Ok(result)
}

/// Discount factor 1 / (1 + rate)^period, built by repeated multiplication.
pub fn discount_factor(rate: Rate, period: u32) -> FincashResult<Decimal> {
    if rate <= dec!(-1) {
        return Err(FincashError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }
    let one_plus_r = Decimal::ONE + rate;
    let mut compound = Decimal::ONE;
    for _ in 0..period {
        compound = compound
            .checked_mul(one_plus_r)
            .ok_or_else(|| FincashError::DivisionByZero {
                context: format!("discount factor overflow at period {period}"),
            })?;
    }
    if compound.is_zero() {
        return Err(FincashError::DivisionByZero {
            context: format!("discount factor at period {period}"),
        });
    }
    Ok(Decimal::ONE / compound)
}

/// NPV and dNPV/dr at `rate`, or `None` once the arithmetic leaves the
/// representable range (very negative or very large rates on long streams).
fn npv_and_derivative(rate: Rate, cash_flows: &[Money]) -> Option<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }

    let mut npv_val = Decimal::ZERO;
    let mut dnpv = Decimal::ZERO;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount.checked_mul(one_plus_r)?;
        }
        if discount.is_zero() {
            return None;
        }
        npv_val = npv_val.checked_add(cf.checked_div(discount)?)?;
        if t > 0 {
            let t_dec = Decimal::from(t as i64);
            let next = discount.checked_mul(one_plus_r)?;
            dnpv = dnpv.checked_sub(t_dec.checked_mul(*cf)?.checked_div(next)?)?;
        }
    }

    Some((npv_val, dnpv))
}

/// Internal Rate of Return using Newton-Raphson.
///
/// The stream is indexed from t = 0. Fails with `ConvergenceFailure` when the
/// iteration budget runs out or the derivative vanishes, and with
/// `InsufficientData` for streams that cannot have a root.
pub fn irr(cash_flows: &[Money], guess: Rate) -> FincashResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(FincashError::InsufficientData(
            "IRR requires at least 2 cash flows".into(),
        ));
    }

    // No sign change, no real root
    let has_positive = cash_flows.iter().any(|cf| *cf > Decimal::ZERO);
    let has_negative = cash_flows.iter().any(|cf| *cf < Decimal::ZERO);
    if !has_positive || !has_negative {
        return Err(FincashError::InsufficientData(
            "IRR requires at least one sign change in the cash flows".into(),
        ));
    }

    let mut rate = guess;
    let mut last_delta = Decimal::ZERO;

    for i in 0..MAX_IRR_ITERATIONS {
        let (npv_val, dnpv) =
            npv_and_derivative(rate, cash_flows).ok_or(FincashError::ConvergenceFailure {
                function: "IRR".into(),
                iterations: i,
                last_delta,
            })?;
        last_delta = npv_val;

        if npv_val.abs() < CONVERGENCE_THRESHOLD {
            return Ok(rate);
        }

        if dnpv.is_zero() {
            return Err(FincashError::ConvergenceFailure {
                function: "IRR".into(),
                iterations: i,
                last_delta: npv_val,
            });
        }

        rate -= npv_val / dnpv;

        // Guard against divergence
        if rate < IRR_LOWER_BOUND {
            rate = IRR_LOWER_BOUND;
        } else if rate > dec!(10.0) {
            rate = dec!(10.0);
        }
    }

    Err(FincashError::ConvergenceFailure {
        function: "IRR".into(),
        iterations: MAX_IRR_ITERATIONS,
        last_delta,
    })
}

/// Project IRR for an initial outlay followed by period cash flows 1..n.
///
/// Returns `None` unless the solver lands on a rate inside (-0.99, 1.0) whose
/// residual NPV is below 1e-6. Callers branch on the absence; there is no
/// substitute value.
pub fn solve_irr(outlay: Money, flows: &[Money]) -> Option<Rate> {
    let mut stream = Vec::with_capacity(flows.len() + 1);
    stream.push(-outlay);
    stream.extend_from_slice(flows);

    let rate = match irr(&stream, IRR_INITIAL_GUESS) {
        Ok(r) => r,
        Err(e) => {
            debug!(error = %e, "IRR solver found no root");
            return None;
        }
    };

    if rate <= IRR_LOWER_BOUND || rate >= IRR_UPPER_BOUND {
        debug!(%rate, "IRR outside the admissible domain");
        return None;
    }

    match npv(rate, &stream) {
        Ok(residual) if residual.abs() < IRR_MAX_RESIDUAL => Some(rate),
        Ok(residual) => {
            debug!(%rate, %residual, "IRR residual above tolerance");
            None
        }
        Err(e) => {
            debug!(error = %e, "IRR residual could not be evaluated");
            None
        }
    }
}

/// Payback period: first (fractional) period at which cumulative flows reach
/// `target`.
///
/// The fractional part is interpolated as `period - excess / flow`. When the
/// flows never recover the target the stream length is returned as a
/// conservative ceiling; it does not imply eventual recovery.
pub fn payback_period(target: Money, flows: &[Money]) -> Decimal {
    let mut cumulative = Decimal::ZERO;
    for (i, cf) in flows.iter().enumerate() {
        cumulative += cf;
        if cumulative >= target {
            let period = Decimal::from(i as u64 + 1);
            if cf.is_zero() {
                return period;
            }
            let excess = cumulative - target;
            return period - excess / cf;
        }
    }
    Decimal::from(flows.len() as u64)
}

/// Payment (PMT)
pub fn pmt(
    rate: Rate,
    nper: u32,
    present_value: Money,
    future_value: Money,
) -> FincashResult<Money> {
    if nper == 0 {
        return Err(FincashError::InvalidInput {
            field: "nper".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }

    if rate.is_zero() {
        return Ok(-(present_value + future_value) / Decimal::from(nper));
    }

    let one_plus_r = Decimal::ONE + rate;
    let factor = one_plus_r
        .checked_powd(Decimal::from(nper))
        .ok_or_else(|| FincashError::DivisionByZero {
            context: "PMT compounding factor overflow".into(),
        })?;
    let annuity_factor = (factor - Decimal::ONE) / rate;

    if annuity_factor.is_zero() {
        return Err(FincashError::DivisionByZero {
            context: "PMT annuity factor".into(),
        });
    }

    Ok(-(present_value * factor + future_value) / annuity_factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_npv_basic() {
        let cfs = vec![dec!(-1000), dec!(300), dec!(400), dec!(500)];
        let result = npv(dec!(0.10), &cfs).unwrap();
        // NPV at 10%: -1000 + 300/1.1 + 400/1.21 + 500/1.331 ≈ -21.04
        assert!((result - dec!(-21.04)).abs() < dec!(1.0));
    }

    #[test]
    fn test_npv_zero_rate() {
        let cfs = vec![dec!(-100), dec!(50), dec!(50), dec!(50)];
        let result = npv(dec!(0.0), &cfs).unwrap();
        assert_eq!(result, dec!(50));
    }

    #[test]
    fn test_irr_basic() {
        let cfs = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        let result = irr(&cfs, dec!(0.10)).unwrap();
        // IRR should be ~9.7%
        assert!((result - dec!(0.097)).abs() < dec!(0.01));
    }

    #[test]
    fn test_irr_requires_sign_change() {
        let cfs = vec![dec!(100), dec!(50), dec!(50)];
        assert!(matches!(
            irr(&cfs, dec!(0.10)),
            Err(FincashError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_solve_irr_round_trip() {
        let flows = vec![dec!(300000); 5];
        let r = solve_irr(dec!(1000000), &flows).expect("root should exist");
        let mut stream = vec![dec!(-1000000)];
        stream.extend_from_slice(&flows);
        assert!(npv(r, &stream).unwrap().abs() < dec!(0.0001));
        // ~15.24%
        assert!((r - dec!(0.1524)).abs() < dec!(0.001));
    }

    #[test]
    fn test_solve_irr_absent_without_recovery_sign() {
        // Flows all negative after the outlay: no real root
        let flows = vec![dec!(-100), dec!(-100)];
        assert!(solve_irr(dec!(1000), &flows).is_none());
        // Empty stream
        assert!(solve_irr(dec!(1000), &[]).is_none());
    }

    #[test]
    fn test_solve_irr_absent_outside_domain() {
        // Recovers 10x in one period: IRR = 900%, outside (-0.99, 1.0)
        assert!(solve_irr(dec!(100), &[dec!(1000)]).is_none());
    }

    #[test]
    fn test_discount_factor() {
        assert_eq!(discount_factor(dec!(0.10), 0).unwrap(), Decimal::ONE);
        let df2 = discount_factor(dec!(0.10), 2).unwrap();
        assert!((df2 - dec!(0.826446)).abs() < dec!(0.000001));
        assert!(discount_factor(dec!(-1), 1).is_err());
    }

    #[test]
    fn test_payback_interpolated() {
        // 400 + 400 = 800, third period recovers 200 of 400 -> 2.5
        let flows = vec![dec!(400), dec!(400), dec!(400)];
        assert_eq!(payback_period(dec!(1000), &flows), dec!(2.5));
    }

    #[test]
    fn test_payback_not_recovered_returns_length() {
        let flows = vec![dec!(100), dec!(100)];
        assert_eq!(payback_period(dec!(1000), &flows), dec!(2));
        assert_eq!(payback_period(dec!(1000), &[]), Decimal::ZERO);
    }

    #[test]
    fn test_pmt_annuity() {
        // 1000 over 12 periods at 1%: ~88.85
        let p = -pmt(dec!(0.01), 12, dec!(1000), Decimal::ZERO).unwrap();
        assert!((p - dec!(88.8488)).abs() < dec!(0.001));
        let flat = -pmt(Decimal::ZERO, 4, dec!(1000), Decimal::ZERO).unwrap();
        assert_eq!(flat, dec!(250));
    }
}
