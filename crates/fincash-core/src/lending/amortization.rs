use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use crate::error::FincashError;
use crate::time_value::pmt;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::FincashResult;

const MONTHS_PER_YEAR: Decimal = dec!(12);
const MAX_DURATION_MONTHS: u32 = 1200;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Repayment policy for a loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmortizationType {
    /// Equal total payment every period (French annuity)
    #[default]
    Constant,
    /// Equal principal every period, declining interest
    Linear,
    /// Interest only, principal repaid with the last payment
    InFine,
}

impl fmt::Display for AmortizationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmortizationType::Constant => write!(f, "constant"),
            AmortizationType::Linear => write!(f, "linear"),
            AmortizationType::InFine => write!(f, "in_fine"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanInput {
    #[serde(alias = "loan_amount")]
    pub principal: Money,
    /// Nominal annual rate; the period rate is annual_rate / 12
    pub annual_rate: Rate,
    pub duration_months: u32,
    pub amortization_type: AmortizationType,
}

impl Default for LoanInput {
    fn default() -> Self {
        Self {
            principal: dec!(1000000),
            annual_rate: dec!(0.05),
            duration_months: 60,
            amortization_type: AmortizationType::Constant,
        }
    }
}

/// One row of the amortization table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationPeriod {
    pub period: u32,
    /// principal_portion + interest_portion
    pub payment: Money,
    pub principal_portion: Money,
    pub interest_portion: Money,
    /// Balance after this period's payment
    pub remaining_balance: Money,
}

/// Headline figures of one repayment policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationSummary {
    pub first_payment: Money,
    pub total_interest: Money,
    pub total_cost: Money,
}

/// The same loan under all three repayment policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationComparison {
    pub constant: AmortizationSummary,
    pub linear: AmortizationSummary,
    pub in_fine: AmortizationSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanOutput {
    pub principal: Money,
    pub annual_rate: Rate,
    pub duration_months: u32,
    pub amortization_type: AmortizationType,
    pub initial_payment: Money,
    pub total_interest: Money,
    /// principal + total_interest
    pub total_cost: Money,
    /// Annualised all-in cost, in percent
    pub effective_global_rate: Decimal,
    pub schedule: Vec<AmortizationPeriod>,
    pub comparison: AmortizationComparison,
    pub recommendations: Vec<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Build the full amortization table for a loan, with totals and a
/// comparison of the three repayment policies.
pub fn calculate_loan(input: &LoanInput) -> FincashResult<ComputationOutput<LoanOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_loan_terms(input.principal, input.annual_rate, input.duration_months)?;

    let period_rate = input.annual_rate / MONTHS_PER_YEAR;
    let schedule = generate_schedule(
        input.principal,
        period_rate,
        input.duration_months,
        input.amortization_type,
    )?;
    let summary = summarize(input.principal, &schedule);

    let effective_global_rate =
        effective_global_rate(input.principal, summary.total_cost, input.duration_months)
            .unwrap_or_else(|| {
                warnings.push("Effective global rate could not be computed".into());
                Decimal::ZERO
            });

    let comparison =
        compare_amortization_types(input.principal, input.annual_rate, input.duration_months)?;

    let recommendations = build_recommendations(
        input.amortization_type,
        input.principal,
        summary.total_interest,
    );

    let output = LoanOutput {
        principal: input.principal,
        annual_rate: input.annual_rate,
        duration_months: input.duration_months,
        amortization_type: input.amortization_type,
        initial_payment: summary.first_payment,
        total_interest: summary.total_interest,
        total_cost: summary.total_cost,
        effective_global_rate,
        schedule,
        comparison,
        recommendations,
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        &format!("Loan amortization ({})", input.amortization_type),
        input,
        warnings,
        elapsed,
        output,
    ))
}

/// Generate the period-by-period schedule for one repayment policy.
///
/// The last period repays whatever balance remains, so the closing balance is
/// exactly zero and the principal portions sum to `principal`.
pub fn generate_schedule(
    principal: Money,
    period_rate: Rate,
    periods: u32,
    kind: AmortizationType,
) -> FincashResult<Vec<AmortizationPeriod>> {
    if periods == 0 {
        return Err(FincashError::InvalidInput {
            field: "duration_months".into(),
            reason: "Loan must run for at least one period".into(),
        });
    }

    let level_payment = match kind {
        AmortizationType::Constant => -pmt(period_rate, periods, principal, Decimal::ZERO)?,
        _ => Decimal::ZERO,
    };
    let level_principal = principal / Decimal::from(periods);

    let mut schedule = Vec::with_capacity(periods as usize);
    let mut balance = principal;

    for period in 1..=periods {
        let interest_portion = balance * period_rate;
        let principal_portion = if period == periods {
            balance
        } else {
            match kind {
                AmortizationType::Constant => level_payment - interest_portion,
                AmortizationType::Linear => level_principal,
                AmortizationType::InFine => Decimal::ZERO,
            }
        };

        balance = if period == periods {
            Decimal::ZERO
        } else {
            balance - principal_portion
        };

        schedule.push(AmortizationPeriod {
            period,
            payment: principal_portion + interest_portion,
            principal_portion,
            interest_portion,
            remaining_balance: balance,
        });
    }

    Ok(schedule)
}

/// First payment, total interest and total cost under each policy.
pub fn compare_amortization_types(
    principal: Money,
    annual_rate: Rate,
    duration_months: u32,
) -> FincashResult<AmortizationComparison> {
    validate_loan_terms(principal, annual_rate, duration_months)?;
    let period_rate = annual_rate / MONTHS_PER_YEAR;

    let summary_for = |kind| -> FincashResult<AmortizationSummary> {
        let schedule = generate_schedule(principal, period_rate, duration_months, kind)?;
        Ok(summarize(principal, &schedule))
    };

    Ok(AmortizationComparison {
        constant: summary_for(AmortizationType::Constant)?,
        linear: summary_for(AmortizationType::Linear)?,
        in_fine: summary_for(AmortizationType::InFine)?,
    })
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_loan_terms(
    principal: Money,
    annual_rate: Rate,
    duration_months: u32,
) -> FincashResult<()> {
    if principal <= Decimal::ZERO {
        return Err(FincashError::InvalidInput {
            field: "principal".into(),
            reason: "Loan principal must be positive".into(),
        });
    }
    if duration_months == 0 || duration_months > MAX_DURATION_MONTHS {
        return Err(FincashError::InvalidInput {
            field: "duration_months".into(),
            reason: format!("Duration must be between 1 and {MAX_DURATION_MONTHS} months"),
        });
    }
    if annual_rate < Decimal::ZERO {
        return Err(FincashError::InvalidInput {
            field: "annual_rate".into(),
            reason: "Annual rate cannot be negative".into(),
        });
    }
    Ok(())
}

fn summarize(principal: Money, schedule: &[AmortizationPeriod]) -> AmortizationSummary {
    let total_interest: Money = schedule.iter().map(|p| p.interest_portion).sum();
    AmortizationSummary {
        first_payment: schedule.first().map(|p| p.payment).unwrap_or(Decimal::ZERO),
        total_interest,
        total_cost: principal + total_interest,
    }
}

/// ((total_cost / principal)^(12 / n) - 1) * 100
fn effective_global_rate(
    principal: Money,
    total_cost: Money,
    duration_months: u32,
) -> Option<Decimal> {
    let growth = total_cost / principal;
    let exponent = MONTHS_PER_YEAR / Decimal::from(duration_months);
    growth
        .checked_powd(exponent)
        .map(|annual| (annual - Decimal::ONE) * dec!(100))
}

fn build_recommendations(
    kind: AmortizationType,
    principal: Money,
    total_interest: Money,
) -> Vec<String> {
    let interest_share = total_interest / principal * dec!(100);

    let mut recs = vec![
        format!("Repayment policy: {kind}"),
        format!("Total credit cost: {total_interest:.0} ({interest_share:.1}% of principal)"),
    ];

    recs.push(
        match kind {
            AmortizationType::Constant => "Level payments make budgeting straightforward",
            AmortizationType::Linear => "Declining interest lowers the total cost over the loan life",
            AmortizationType::InFine => "Principal is due in full at maturity; plan the cash for it",
        }
        .to_string(),
    );

    recs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
