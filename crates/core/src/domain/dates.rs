use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::errors::DomainError;

/// Parses the date shapes callers send: RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS`, or a bare
/// `YYYY-MM-DD` (taken as midnight UTC).
pub fn parse_date(value: &str) -> Result<DateTime<Utc>, DomainError> {
    let trimmed = value.trim();

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| DomainError::InvalidDate(value.to_string()))
}

/// Parses `value` when present, otherwise falls back to `now`.
pub fn parse_date_or(
    value: Option<&str>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, DomainError> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => parse_date(value),
        None => Ok(now),
    }
}
