//! Tests for [`Calendar`] parsing, filtering and serialisation.

use chrono::{DateTime, TimeZone, Utc};

use icalfilter::calendar::cutoff_for_months;
use icalfilter::{Calendar, CalendarError, FilterStats};

fn cutoff() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn document(events: &[&str]) -> String {
    let mut doc = String::from(
        "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Example//Feed//EN\r\n\
         BEGIN:VTIMEZONE\r\nTZID:Europe/Oslo\r\nEND:VTIMEZONE\r\n",
    );
    for event in events {
        doc.push_str(event);
    }
    doc.push_str("END:VCALENDAR\r\n");
    doc
}

const PAST: &str = "BEGIN:VEVENT\r\nUID:past\r\nDTSTART:20230101T100000Z\r\n\
                    DTEND:20230101T110000Z\r\nSUMMARY:Old standup\r\nEND:VEVENT\r\n";

const FUTURE: &str = "BEGIN:VEVENT\r\nUID:future\r\nDTSTART:20240710T100000Z\r\n\
                      DTEND:20240710T110000Z\r\nSUMMARY:Planning\r\nEND:VEVENT\r\n";

const WEEKLY_FOREVER: &str = "BEGIN:VEVENT\r\nUID:weekly\r\nDTSTART:20200106T090000Z\r\n\
                              DTEND:20200106T093000Z\r\nRRULE:FREQ=WEEKLY;BYDAY=MO\r\n\
                              END:VEVENT\r\n";

const WEEKLY_ENDED: &str = "BEGIN:VEVENT\r\nUID:weekly-ended\r\nDTSTART:20200106T090000Z\r\n\
                            DTEND:20200106T093000Z\r\nRRULE:FREQ=WEEKLY;UNTIL=20201231T000000Z\r\n\
                            END:VEVENT\r\n";

fn uids(calendar: &Calendar) -> Vec<String> {
    calendar
        .events()
        .filter_map(|e| e.property("UID").map(|p| p.value.clone()))
        .collect()
}

#[test]
fn filter_drops_only_finished_events() {
    let mut calendar =
        Calendar::parse(&document(&[PAST, FUTURE, WEEKLY_FOREVER, WEEKLY_ENDED])).unwrap();

    let stats = calendar.filter_before(cutoff());

    assert_eq!(stats, FilterStats { removed: 2, kept: 2 });
    assert_eq!(uids(&calendar), ["future", "weekly"]);
}

#[test]
fn filter_keeps_non_event_components() {
    let mut calendar = Calendar::parse(&document(&[PAST])).unwrap();
    calendar.filter_before(cutoff());

    let names: Vec<_> = calendar.root().components.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["VTIMEZONE"]);
    assert_eq!(calendar.root().property("PRODID").unwrap().value, "-//Example//Feed//EN");
}

#[test]
fn event_ending_exactly_at_cutoff_is_kept() {
    let edge = "BEGIN:VEVENT\r\nUID:edge\r\nDTSTART:20240531T230000Z\r\n\
                DTEND:20240601T000000Z\r\nEND:VEVENT\r\n";
    let mut calendar = Calendar::parse(&document(&[edge])).unwrap();
    assert_eq!(calendar.filter_before(cutoff()).kept, 1);
}

#[test]
fn counted_recurrence_reaching_past_cutoff_is_kept() {
    let counted = "BEGIN:VEVENT\r\nUID:counted\r\nDTSTART:20240101T090000Z\r\n\
                   DTEND:20240101T100000Z\r\nRRULE:FREQ=MONTHLY;COUNT=12\r\nEND:VEVENT\r\n";
    let short = "BEGIN:VEVENT\r\nUID:short\r\nDTSTART:20240101T090000Z\r\n\
                 DTEND:20240101T100000Z\r\nRRULE:FREQ=DAILY;COUNT=3\r\nEND:VEVENT\r\n";
    let mut calendar = Calendar::parse(&document(&[counted, short])).unwrap();

    calendar.filter_before(cutoff());
    assert_eq!(uids(&calendar), ["counted"]);
}

#[test]
fn kept_events_lose_diagnostic_artifacts() {
    let noisy = "BEGIN:VEVENT\r\nUID:noisy\r\n\
                 DTSTART;TZID=Europe/Oslo;X-VOBJ-ORIGINAL-TZID=W. Europe:20240710T100000\r\n\
                 DTEND:20240710T110000Z\r\n\
                 X-LIC-ERROR:No value for LOCATION property. Removing entire property:\r\n\
                 X-MS-OLK-SENDER:someone\r\nEND:VEVENT\r\n";
    let mut calendar = Calendar::parse(&document(&[noisy])).unwrap();
    calendar.filter_before(cutoff());

    let event = calendar.events().next().unwrap();
    assert!(event.property("X-LIC-ERROR").is_none());
    // Other X- properties are left alone; only X- parameters go.
    assert!(event.property("X-MS-OLK-SENDER").is_some());
    let dtstart = event.property("DTSTART").unwrap();
    assert_eq!(dtstart.params.len(), 1);
    assert_eq!(dtstart.param("tzid").unwrap().value, "Europe/Oslo");

    let ics = calendar.to_ics();
    assert!(ics.contains("DTSTART;TZID=Europe/Oslo:20240710T100000\r\n"));
    assert!(!ics.contains("X-VOBJ"));
}

#[test]
fn serialisation_round_trips() {
    let source = document(&[FUTURE, WEEKLY_FOREVER]);
    let calendar: Calendar = source.parse().unwrap();

    assert_eq!(calendar.to_ics(), source);
    assert_eq!(calendar.to_string(), source);
    assert_eq!(Calendar::parse(&calendar.to_ics()).unwrap(), calendar);
}

#[test]
fn folded_input_is_unfolded_and_refolded() {
    let description = "D".repeat(200);
    let folded = format!(
        "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:long\nDESCRIPTION:{}\n {}\nEND:VEVENT\nEND:VCALENDAR\n",
        &description[..100],
        &description[100..]
    );
    let calendar = Calendar::parse(&folded).unwrap();

    let event = calendar.events().next().unwrap();
    assert_eq!(event.property("DESCRIPTION").unwrap().value, description);

    let ics = calendar.to_ics();
    assert!(ics.lines().all(|line| line.trim_end_matches('\r').len() <= 75));
    assert!(ics.ends_with("END:VCALENDAR\r\n"));
}

#[test]
fn quoted_parameter_may_contain_separators() {
    let source = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\n\
                  ATTENDEE;CN=\"Doe; Jane: PM\":mailto:jane@example.com\r\n\
                  END:VEVENT\r\nEND:VCALENDAR\r\n";
    let calendar = Calendar::parse(source).unwrap();
    let attendee = calendar.events().next().unwrap().property("ATTENDEE").unwrap();

    assert_eq!(attendee.param("CN").unwrap().unquoted(), "Doe; Jane: PM");
    assert_eq!(attendee.value, "mailto:jane@example.com");
    assert_eq!(calendar.to_ics(), source);
}

#[test]
fn non_calendar_document_is_rejected() {
    let err = Calendar::parse("BEGIN:VCARD\r\nFN:Jane\r\nEND:VCARD\r\n").unwrap_err();
    assert_eq!(
        err,
        CalendarError::NotVCalendar {
            found: "VCARD".to_string()
        }
    );
}

#[test]
fn html_error_page_is_a_parse_error() {
    let err = Calendar::parse("<html><body>Not Found</body></html>").unwrap_err();
    assert!(matches!(err, CalendarError::Parse { line: 1, .. }));
}

#[test]
fn empty_document_is_rejected() {
    assert_eq!(Calendar::parse("\r\n\r\n").unwrap_err(), CalendarError::Empty);
}

#[test]
fn open_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feed.ics");
    std::fs::write(&path, document(&[FUTURE])).unwrap();

    let calendar = Calendar::open(&path).unwrap();
    assert_eq!(uids(&calendar), ["future"]);

    assert!(Calendar::open(&dir.path().join("missing.ics")).is_err());
}

#[test]
fn cutoff_for_months_uses_calendar_months() {
    let now = Utc.with_ymd_and_hms(2024, 5, 31, 12, 0, 0).unwrap();
    assert_eq!(
        cutoff_for_months(now, 3),
        Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap()
    );
    assert_eq!(cutoff_for_months(now, 0), now);
}
