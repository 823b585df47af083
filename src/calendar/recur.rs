//! Just enough RRULE to answer "can this event still occur after X?".
//!
//! No occurrence expansion happens. A rule bounded by `UNTIL` is exact; a
//! rule bounded by `COUNT` uses `DTSTART + COUNT * INTERVAL * FREQ`, which
//! over-estimates the last occurrence when BYxxx parts add occurrences per
//! period. Over-estimating only ever keeps an event that could have gone.

use chrono::{DateTime, Months, TimeDelta, Utc};

use super::time::parse_time;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecurrenceRule {
    pub freq: Frequency,
    pub interval: u32,
    pub until: Option<DateTime<Utc>>,
    pub count: Option<u32>,
}

impl RecurrenceRule {
    /// Parse an RRULE value. Returns `None` for rules without a valid FREQ.
    pub(crate) fn parse(value: &str) -> Option<Self> {
        let mut freq = None;
        let mut interval = 1;
        let mut until = None;
        let mut count = None;
        for part in value.trim().split(';') {
            let Some((key, val)) = part.split_once('=') else {
                continue;
            };
            match key.to_ascii_uppercase().as_str() {
                "FREQ" => {
                    freq = Some(match val.to_ascii_uppercase().as_str() {
                        "SECONDLY" => Frequency::Secondly,
                        "MINUTELY" => Frequency::Minutely,
                        "HOURLY" => Frequency::Hourly,
                        "DAILY" => Frequency::Daily,
                        "WEEKLY" => Frequency::Weekly,
                        "MONTHLY" => Frequency::Monthly,
                        "YEARLY" => Frequency::Yearly,
                        _ => return None,
                    })
                }
                "INTERVAL" => interval = val.parse().ok().filter(|n| *n > 0)?,
                "UNTIL" => {
                    let t = parse_time(val)?;
                    // A DATE bound includes occurrences later that day.
                    until = Some(if t.is_date {
                        t.at + TimeDelta::days(1)
                    } else {
                        t.at
                    });
                }
                "COUNT" => count = val.parse().ok(),
                _ => {}
            }
        }
        Some(Self {
            freq: freq?,
            interval,
            until,
            count,
        })
    }

    /// Whether an occurrence may start at or after `cutoff`.
    pub(crate) fn recurs_on_or_after(&self, start: DateTime<Utc>, cutoff: DateTime<Utc>) -> bool {
        if let Some(until) = self.until {
            return until >= cutoff;
        }
        match self.count {
            Some(count) => {
                let steps = i64::from(count) * i64::from(self.interval);
                // Overflow means "far future".
                self.advance(start, steps).is_none_or(|last| last >= cutoff)
            }
            None => true,
        }
    }

    fn advance(&self, start: DateTime<Utc>, steps: i64) -> Option<DateTime<Utc>> {
        let delta = match self.freq {
            Frequency::Secondly => TimeDelta::try_seconds(steps)?,
            Frequency::Minutely => TimeDelta::try_minutes(steps)?,
            Frequency::Hourly => TimeDelta::try_hours(steps)?,
            Frequency::Daily => TimeDelta::try_days(steps)?,
            Frequency::Weekly => TimeDelta::try_weeks(steps)?,
            Frequency::Monthly => {
                return start.checked_add_months(Months::new(u32::try_from(steps).ok()?));
            }
            Frequency::Yearly => {
                let months = u32::try_from(steps.checked_mul(12)?).ok()?;
                return start.checked_add_months(Months::new(months));
            }
        };
        start.checked_add_signed(delta)
    }
}
