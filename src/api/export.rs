use crate::core::{SchedulePoint, SipError, SipResult};

pub const SCHEDULE_CSV_FILENAME: &str = "sip_schedule.csv";

const BASIC_HEADER: [&str; 3] = ["Month", "Total Invested", "Future Value"];
const BREAKDOWN_HEADER: [&str; 5] = [
    "Month",
    "Year",
    "Total Invested",
    "Estimated Returns",
    "Future Value",
];

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ScheduleColumns {
    #[default]
    Basic,
    Breakdown,
}

impl ScheduleColumns {
    pub fn from_breakdown(breakdown: bool) -> Self {
        if breakdown {
            ScheduleColumns::Breakdown
        } else {
            ScheduleColumns::Basic
        }
    }

    fn header(self) -> &'static [&'static str] {
        match self {
            ScheduleColumns::Basic => &BASIC_HEADER,
            ScheduleColumns::Breakdown => &BREAKDOWN_HEADER,
        }
    }

    fn row(self, point: &SchedulePoint) -> Vec<String> {
        match self {
            ScheduleColumns::Basic => vec![
                point.month.to_string(),
                csv_amount(point.cumulative_invested),
                csv_amount(point.future_value),
            ],
            ScheduleColumns::Breakdown => vec![
                point.month.to_string(),
                point.year().to_string(),
                csv_amount(point.cumulative_invested),
                csv_amount(point.estimated_returns()),
                csv_amount(point.future_value),
            ],
        }
    }
}

/// Header row plus one line per month. Amounts use a period decimal
/// separator with two places and no grouping.
pub fn schedule_csv(schedule: &[SchedulePoint], columns: ScheduleColumns) -> SipResult<String> {
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    wtr.write_record(columns.header())?;
    for point in schedule {
        wtr.write_record(columns.row(point))?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| SipError::Export(e.error().to_string()))?;
    String::from_utf8(bytes).map_err(|e| SipError::Export(e.to_string()))
}

fn csv_amount(value: f64) -> String {
    format!("{value:.2}")
}

/// Two decimals with comma thousands grouping, e.g. `1,161,695.38`.
pub fn format_amount(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    // Sign follows the rounded digits, so -0.001 prints as 0.00.
    let rounds_to_zero = fixed.bytes().all(|b| matches!(b, b'0' | b'.'));
    let sign = if value < 0.0 && !rounds_to_zero { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}
