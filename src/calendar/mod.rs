//! iCalendar documents and the past-event filter.
//!
//! [`Calendar::parse`] reads a `VCALENDAR` document into a component tree,
//! [`Calendar::filter_before`] drops events that are over for good, and
//! [`Calendar::to_ics`] (or `Display`) writes the result back out with CRLF
//! line endings and 75-octet folding.
//!
//! An event is removed when its end lies before the cutoff and neither an
//! `RRULE` nor an `RDATE` can put an occurrence at or after it. Surviving
//! events lose their `X-LIC-ERROR` properties and every `X-` parameter,
//! which some producers emit in large quantities.

mod parse;
mod recur;
mod time;

pub use parse::{Component, Parameter, Property};

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Months, TimeDelta, Utc};
use tracing::debug;

use crate::error::CalendarError;
use crate::{IcalFilterError, Result};
use recur::RecurrenceRule;
use time::{parse_duration, parse_time};

/// Outcome of [`Calendar::filter_before`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    /// Events dropped as past.
    pub removed: usize,
    /// Events left in the calendar.
    pub kept: usize,
}

/// A parsed `VCALENDAR` document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calendar {
    root: Component,
}

impl Calendar {
    /// Parse a document whose top-level component must be `VCALENDAR`.
    pub fn parse(source: &str) -> std::result::Result<Self, CalendarError> {
        let root = parse::parse_document(source)?;
        if root.name != "VCALENDAR" {
            return Err(CalendarError::NotVCalendar { found: root.name });
        }
        Ok(Self { root })
    }

    /// Read and parse a calendar file.
    pub fn open(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::parse(&source).map_err(IcalFilterError::from)
    }

    /// The `VCALENDAR` component.
    pub fn root(&self) -> &Component {
        &self.root
    }

    /// `VEVENT`s directly under the calendar.
    pub fn events(&self) -> impl Iterator<Item = &Component> {
        self.root
            .components
            .iter()
            .filter(|c| c.name == "VEVENT")
    }

    /// Remove events that ended before `cutoff` and never recur after it.
    pub fn filter_before(&mut self, cutoff: DateTime<Utc>) -> FilterStats {
        let mut stats = FilterStats::default();
        self.root.components.retain_mut(|component| {
            if component.name != "VEVENT" {
                return true;
            }
            if is_over(component, cutoff) {
                stats.removed += 1;
                return false;
            }
            strip_artifacts(component);
            stats.kept += 1;
            true
        });
        debug!(
            removed = stats.removed,
            kept = stats.kept,
            %cutoff,
            "filtered calendar"
        );
        stats
    }

    /// Serialise to iCalendar text.
    pub fn to_ics(&self) -> String {
        let mut out = String::new();
        self.root.write_to(&mut out);
        out
    }
}

impl FromStr for Calendar {
    type Err = CalendarError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_ics())
    }
}

/// `now` minus whole calendar months, clamped to the end of shorter months.
pub fn cutoff_for_months(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn is_over(event: &Component, cutoff: DateTime<Utc>) -> bool {
    // Events without any usable time are kept.
    event_end(event).is_some_and(|end| end < cutoff && !recurs_on_or_after(event, cutoff))
}

fn event_end(event: &Component) -> Option<DateTime<Utc>> {
    if let Some(end) = event.property("DTEND").and_then(|p| parse_time(&p.value)) {
        return Some(end.at);
    }
    let start = event.property("DTSTART").and_then(|p| parse_time(&p.value))?;
    if let Some(duration) = event.property("DURATION").and_then(|p| parse_duration(&p.value)) {
        return start.at.checked_add_signed(duration);
    }
    if start.is_date {
        start.at.checked_add_signed(TimeDelta::try_days(1)?)
    } else {
        Some(start.at)
    }
}

fn recurs_on_or_after(event: &Component, cutoff: DateTime<Utc>) -> bool {
    let start = event.property("DTSTART").and_then(|p| parse_time(&p.value));
    let by_rule = start.is_some_and(|start| {
        event
            .properties_named("RRULE")
            .filter_map(|p| RecurrenceRule::parse(&p.value))
            .any(|rule| rule.recurs_on_or_after(start.at, cutoff))
    });

    by_rule
        || event
            .properties_named("RDATE")
            .flat_map(|p| p.value.split(','))
            // PERIOD values: only the start matters.
            .filter_map(|v| parse_time(v.split_once('/').map_or(v, |(start, _)| start)))
            .any(|t| t.at >= cutoff)
}

fn strip_artifacts(event: &mut Component) {
    event.properties.retain(|p| p.name != "X-LIC-ERROR");
    for property in &mut event.properties {
        property.params.retain(|param| !param.name.starts_with("X-"));
    }
}
