use serde::Serialize;

use super::engine::total_months;
use super::error::{SipError, SipResult};

pub const MIN_MONTHLY_CONTRIBUTION: f64 = 1.0;
pub const MAX_DURATION_YEARS: u32 = 100;

/// One projection request. Rates are percentages, so `12.0` means 12% a year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inputs {
    pub monthly_contribution: f64,
    pub annual_rate_pct: f64,
    pub duration_years: u32,
    pub inflation_rate_pct: f64,
}

impl Inputs {
    pub fn months(&self) -> u32 {
        total_months(self.duration_years)
    }

    /// Checks every field against its documented range. The engine assumes
    /// this has passed and does no checking of its own.
    pub fn validate(&self) -> SipResult<()> {
        if !self.monthly_contribution.is_finite()
            || self.monthly_contribution < MIN_MONTHLY_CONTRIBUTION
        {
            return Err(SipError::invalid("monthly contribution", "must be >= 1"));
        }

        if !self.annual_rate_pct.is_finite() || self.annual_rate_pct <= 0.0 {
            return Err(SipError::invalid("annual rate", "must be > 0"));
        }

        if self.duration_years == 0 {
            return Err(SipError::invalid("duration years", "must be >= 1"));
        }
        if self.duration_years > MAX_DURATION_YEARS {
            return Err(SipError::invalid(
                "duration years",
                &format!("must be <= {MAX_DURATION_YEARS}"),
            ));
        }

        if !self.inflation_rate_pct.is_finite() || self.inflation_rate_pct < 0.0 {
            return Err(SipError::invalid("inflation rate", "must be >= 0"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_invested: f64,
    pub future_value: f64,
    pub future_value_inflation_adjusted: f64,
    pub lumpsum_equivalent: f64,
}

/// Balance at the end of one elapsed month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePoint {
    pub month: u32,
    pub cumulative_invested: f64,
    pub future_value: f64,
}

impl SchedulePoint {
    /// 1-based investment year containing this month.
    pub fn year(&self) -> u32 {
        self.month.div_ceil(12)
    }

    pub fn estimated_returns(&self) -> f64 {
        self.future_value - self.cumulative_invested
    }
}

#[derive(Debug, Clone)]
pub struct Projection {
    pub summary: Summary,
    pub schedule: Vec<SchedulePoint>,
}
