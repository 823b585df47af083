//! DATE, DATE-TIME and DURATION values.
//!
//! Zone handling is shallow: `...Z` values are UTC, and both floating and
//! `TZID`-qualified values are read as if they were UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};

/// A parsed DATE or DATE-TIME value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimeValue {
    pub at: DateTime<Utc>,
    /// `true` for DATE values (whole days).
    pub is_date: bool,
}

pub(crate) fn parse_time(value: &str) -> Option<TimeValue> {
    let value = value.trim();
    if value.len() == 8 {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").ok()?;
        return Some(TimeValue {
            at: date.and_hms_opt(0, 0, 0)?.and_utc(),
            is_date: true,
        });
    }
    let local = value.strip_suffix('Z').unwrap_or(value);
    let at = NaiveDateTime::parse_from_str(local, "%Y%m%dT%H%M%S").ok()?;
    Some(TimeValue {
        at: at.and_utc(),
        is_date: false,
    })
}

/// Parse an RFC 5545 DURATION such as `PT1H30M`, `P2D` or `-P1W`.
pub(crate) fn parse_duration(value: &str) -> Option<TimeDelta> {
    let value = value.trim();
    let (negative, rest) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };
    let rest = rest.strip_prefix('P')?;

    let mut total = TimeDelta::zero();
    let mut number: Option<i64> = None;
    let mut in_time = false;
    let mut any_unit = false;
    for c in rest.chars() {
        if let Some(digit) = c.to_digit(10) {
            number = Some(number.unwrap_or(0).checked_mul(10)?.checked_add(i64::from(digit))?);
            continue;
        }
        let unit: fn(i64) -> Option<TimeDelta> = match (c, in_time) {
            ('T', false) if number.is_none() => {
                in_time = true;
                continue;
            }
            ('W', false) => TimeDelta::try_weeks,
            ('D', false) => TimeDelta::try_days,
            ('H', true) => TimeDelta::try_hours,
            ('M', true) => TimeDelta::try_minutes,
            ('S', true) => TimeDelta::try_seconds,
            _ => return None,
        };
        total = total.checked_add(&unit(number.take()?)?)?;
        any_unit = true;
    }
    if number.is_some() || !any_unit {
        return None;
    }
    Some(if negative { -total } else { total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_utc_date_time() {
        let t = parse_time("20240315T093000Z").unwrap();
        assert_eq!(t.at, Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap());
        assert!(!t.is_date);
    }

    #[test]
    fn floating_time_is_read_as_utc() {
        let t = parse_time("20240315T093000").unwrap();
        assert_eq!(t.at, Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap());
    }

    #[test]
    fn parses_date() {
        let t = parse_time("20240315").unwrap();
        assert_eq!(t.at, Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());
        assert!(t.is_date);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_time("tomorrow").is_none());
        assert!(parse_time("20241340").is_none());
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("PT1H30M"), Some(TimeDelta::minutes(90)));
        assert_eq!(parse_duration("P2D"), Some(TimeDelta::days(2)));
        assert_eq!(parse_duration("P1W"), Some(TimeDelta::weeks(1)));
        assert_eq!(
            parse_duration("P1DT12H"),
            Some(TimeDelta::days(1) + TimeDelta::hours(12))
        );
        assert_eq!(parse_duration("-PT15M"), Some(-TimeDelta::minutes(15)));
    }

    #[test]
    fn malformed_durations() {
        assert!(parse_duration("1H").is_none());
        assert!(parse_duration("P").is_none());
        assert!(parse_duration("PT5").is_none());
        assert!(parse_duration("P5H").is_none());
    }
}
