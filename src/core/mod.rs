mod engine;
mod error;
mod types;

pub use engine::{
    build_schedule, future_value, inflation_adjust, lumpsum_equivalent, run_projection,
};
pub use error::{SipError, SipResult};
pub use types::{
    Inputs, MAX_DURATION_YEARS, MIN_MONTHLY_CONTRIBUTION, Projection, SchedulePoint, Summary,
};
