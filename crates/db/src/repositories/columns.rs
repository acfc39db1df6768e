use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rust_decimal::Decimal;

use super::RepositoryError;

/// Truncates to the microsecond precision the timestamp columns keep.
pub(crate) fn stored_precision(value: DateTime<Utc>) -> DateTime<Utc> {
    value.trunc_subsecs(6)
}

/// Fixed-width RFC 3339 so lexical order in SQLite matches chronological order.
pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(
    column: &str,
    value: String,
) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_decimal(column: &str, value: String) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(&value).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

pub(crate) fn parse_optional_decimal(
    column: &str,
    value: Option<String>,
) -> Result<Option<Decimal>, RepositoryError> {
    value.map(|amount| parse_decimal(column, amount)).transpose()
}

pub(crate) fn parse_count(column: &str, value: i64) -> Result<u64, RepositoryError> {
    u64::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative count): {value}"
        ))
    })
}

pub(crate) fn parse_enum<T>(column: &str, value: String) -> Result<T, RepositoryError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|error| {
        RepositoryError::Decode(format!("invalid value in `{column}`: `{value}` ({error})"))
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{format_timestamp, parse_decimal, parse_timestamp};

    #[test]
    fn timestamps_are_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid instant");
        let formatted = format_timestamp(whole);

        assert_eq!(formatted, "2026-03-01T09:00:00.000000Z");
        assert_eq!(parse_timestamp("created_at", formatted).expect("parse"), whole);
    }

    #[test]
    fn malformed_columns_surface_as_decode_errors() {
        let error = parse_decimal("amount", "12,50".to_string()).expect_err("should fail");
        assert!(error.to_string().contains("`amount`"));
    }
}
