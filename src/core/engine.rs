use super::types::{Inputs, Projection, SchedulePoint, Summary};

/// Nominal monthly rate as a fraction: the annual percentage divided by 12,
/// not a geometric de-annualization.
fn monthly_rate(annual_rate_pct: f64) -> f64 {
    annual_rate_pct / 100.0 / 12.0
}

/// Callers are expected to pass validated durations. Oversized values
/// saturate instead of wrapping.
pub(crate) fn total_months(duration_years: u32) -> u32 {
    duration_years.saturating_mul(12)
}

fn exponent(periods: u32) -> i32 {
    i32::try_from(periods).unwrap_or(i32::MAX)
}

/// Closed-form value of an annuity due: every contribution is made at the
/// start of its month and earns that month's growth.
pub fn future_value(monthly_contribution: f64, annual_rate_pct: f64, duration_years: u32) -> f64 {
    let rate = monthly_rate(annual_rate_pct);
    let months = total_months(duration_years);
    if rate == 0.0 {
        return monthly_contribution * f64::from(months);
    }

    let growth = (1.0 + rate).powi(exponent(months));
    monthly_contribution * ((growth - 1.0) / rate) * (1.0 + rate)
}

pub fn inflation_adjust(amount: f64, inflation_rate_pct: f64, duration_years: u32) -> f64 {
    amount / (1.0 + inflation_rate_pct / 100.0).powi(exponent(duration_years))
}

/// Month-by-month simulation of the same annuity `future_value` computes in
/// closed form. The last point agrees with it up to float rounding.
///
/// Allocates one point per month, so `duration_years` must already have
/// passed `Inputs::validate`.
pub fn build_schedule(
    monthly_contribution: f64,
    annual_rate_pct: f64,
    duration_years: u32,
) -> Vec<SchedulePoint> {
    let growth = 1.0 + monthly_rate(annual_rate_pct);
    let months = total_months(duration_years);

    let mut schedule = Vec::with_capacity(months as usize);
    let mut balance = 0.0;
    for month in 1..=months {
        balance = (balance + monthly_contribution) * growth;
        schedule.push(SchedulePoint {
            month,
            cumulative_invested: monthly_contribution * f64::from(month),
            future_value: balance,
        });
    }
    schedule
}

/// Value of investing `total_invested` upfront and compounding it yearly.
pub fn lumpsum_equivalent(total_invested: f64, annual_rate_pct: f64, duration_years: u32) -> f64 {
    total_invested * (1.0 + annual_rate_pct / 100.0).powi(exponent(duration_years))
}

pub fn run_projection(inputs: &Inputs) -> Projection {
    let total_invested = inputs.monthly_contribution * f64::from(inputs.months());
    let fv = future_value(
        inputs.monthly_contribution,
        inputs.annual_rate_pct,
        inputs.duration_years,
    );

    let summary = Summary {
        total_invested,
        future_value: fv,
        future_value_inflation_adjusted: inflation_adjust(
            fv,
            inputs.inflation_rate_pct,
            inputs.duration_years,
        ),
        lumpsum_equivalent: lumpsum_equivalent(
            total_invested,
            inputs.annual_rate_pct,
            inputs.duration_years,
        ),
    };
    let schedule = build_schedule(
        inputs.monthly_contribution,
        inputs.annual_rate_pct,
        inputs.duration_years,
    );

    Projection { summary, schedule }
}
