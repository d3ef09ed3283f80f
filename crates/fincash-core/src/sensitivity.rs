use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::FincashResult;

/// Rate shifts applied by the discount/growth sweeps: -2%, -1%, 0, +1%, +2%.
pub const RATE_DELTAS: [Decimal; 5] = [dec!(-0.02), dec!(-0.01), dec!(0), dec!(0.01), dec!(0.02)];

/// One evaluated point of a one-way sensitivity sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    /// Input value the model was re-run with
    pub tested_value: Decimal,
    /// Model output at `tested_value`
    pub output: Decimal,
    /// `output - base_output`
    pub change: Decimal,
    /// Change relative to the base output, in percent (0 when the base is 0)
    pub change_pct: Decimal,
}

/// A named one-way sweep over a single input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivitySeries {
    pub variable: String,
    pub points: Vec<SensitivityPoint>,
}

/// `base + delta` for each delta; shifts outside the Decimal range are dropped.
pub fn shifted_values(base: Decimal, deltas: &[Decimal]) -> Vec<Decimal> {
    deltas.iter().filter_map(|d| base.checked_add(*d)).collect()
}

/// `base * factor` for each factor; products outside the Decimal range are dropped.
pub fn scaled_values(base: Decimal, factors: &[Decimal]) -> Vec<Decimal> {
    factors.iter().filter_map(|f| base.checked_mul(*f)).collect()
}

/// `(output - base, percent change)`; `None` when either leaves the Decimal range.
fn change_from_base(output: Decimal, base_output: Decimal) -> Option<(Decimal, Decimal)> {
    let change = output.checked_sub(base_output)?;
    let change_pct = if base_output.is_zero() {
        Decimal::ZERO
    } else {
        change.checked_div(base_output)?.checked_mul(dec!(100))?
    };
    Some((change, change_pct))
}

/// Re-evaluate a model at each tested value and report the change against
/// `base_output`.
///
/// Points whose evaluation fails are left out of the series and described in
/// `warnings`.
pub fn sweep<F>(
    variable: &str,
    base_output: Decimal,
    tested_values: &[Decimal],
    eval_fn: F,
    warnings: &mut Vec<String>,
) -> SensitivitySeries
where
    F: Fn(Decimal) -> FincashResult<Decimal>,
{
    let mut points = Vec::with_capacity(tested_values.len());

    for value in tested_values {
        match eval_fn(*value) {
            Ok(output) => match change_from_base(output, base_output) {
                Some((change, change_pct)) => points.push(SensitivityPoint {
                    tested_value: *value,
                    output,
                    change,
                    change_pct,
                }),
                None => {
                    debug!(variable, tested_value = %value, "sensitivity change out of range");
                    warnings.push(format!(
                        "Sensitivity on {variable} skipped at {value}: change from base is out of range"
                    ));
                }
            },
            Err(e) => {
                debug!(variable, tested_value = %value, error = %e, "sensitivity point skipped");
                warnings.push(format!(
                    "Sensitivity on {variable} skipped at {value}: {e}"
                ));
            }
        }
    }

    SensitivitySeries {
        variable: variable.to_string(),
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FincashError;

    #[test]
    fn test_shifted_and_scaled_values() {
        assert_eq!(
            shifted_values(dec!(0.10), &RATE_DELTAS),
            vec![dec!(0.08), dec!(0.09), dec!(0.10), dec!(0.11), dec!(0.12)]
        );
        assert_eq!(
            scaled_values(dec!(100), &[dec!(0.9), dec!(1.1)]),
            vec![dec!(90.0), dec!(110.0)]
        );
    }

    #[test]
    fn test_sweep_reports_change_from_base() {
        let mut warnings = Vec::new();
        let series = sweep(
            "x",
            dec!(20),
            &[dec!(5), dec!(10), dec!(15)],
            |x| Ok(x * dec!(2)),
            &mut warnings,
        );
        assert!(warnings.is_empty());
        assert_eq!(series.variable, "x");
        assert_eq!(series.points.len(), 3);
        assert_eq!(series.points[0].change, dec!(-10));
        assert_eq!(series.points[0].change_pct, dec!(-50));
        assert_eq!(series.points[1].change, Decimal::ZERO);
        assert_eq!(series.points[2].change_pct, dec!(50));
    }

    #[test]
    fn test_sweep_skips_failed_points() {
        let mut warnings = Vec::new();
        let series = sweep(
            "rate",
            dec!(1),
            &[dec!(1), dec!(-1), dec!(2)],
            |x| {
                if x < Decimal::ZERO {
                    Err(FincashError::InvalidInput {
                        field: "rate".into(),
                        reason: "negative".into(),
                    })
                } else {
                    Ok(x)
                }
            },
            &mut warnings,
        );
        assert_eq!(series.points.len(), 2);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("rate"));
    }

    #[test]
    fn test_sweep_zero_base_has_zero_pct() {
        let mut warnings = Vec::new();
        let series = sweep("x", Decimal::ZERO, &[dec!(3)], Ok, &mut warnings);
        assert_eq!(series.points[0].change, dec!(3));
        assert_eq!(series.points[0].change_pct, Decimal::ZERO);
    }

    #[test]
    fn test_out_of_range_values_are_dropped() {
        assert!(shifted_values(Decimal::MAX, &[dec!(1)]).is_empty());
        assert!(scaled_values(Decimal::MAX, &[dec!(2)]).is_empty());

        let mut warnings = Vec::new();
        let series = sweep("x", dec!(-1), &[Decimal::MAX], Ok, &mut warnings);
        assert!(series.points.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("out of range"));
    }
}
