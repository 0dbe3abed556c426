use chrono::{DateTime, NaiveDate, Utc};

use crate::errors::AppError;

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Parses a `YYYY-MM-DD` query value into the start of that UTC day.
pub fn parse_day(value: &str) -> Result<DateTime<Utc>, AppError> {
    let day = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::bad_request(format!("invalid date '{value}', expected YYYY-MM-DD")))?;

    day.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| AppError::bad_request(format!("invalid date '{value}'")))
}
