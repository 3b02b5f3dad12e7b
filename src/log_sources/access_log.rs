//! Parser for the whitespace-separated ISO access log.
//!
//! Format: `YYYY-MM-DDTHH:MM:SS[.fff][Z|+HH:MM] <client> <path> <status>`
//!
//! Copyright (c) 2026 CIPS Corps. All rights reserved.

use crate::log_sources::{LineRejection, LogSource, ParsedLine};
use crate::{LogEvent, TimeOfDay};
use regex::Regex;
use std::sync::LazyLock;

/// Time portion of the timestamp with an optional trailing zone marker.
static RE_TIME_WITH_ZONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2}:\d{2}:\d{2}(?:\.\d{1,9})?)(?:Z|[+-]\d{2}:?\d{2})?$").expect("regex")
});

pub struct AccessLogSource {
    name: String,
}

impl AccessLogSource {
    pub fn new() -> Self {
        Self { name: "iso-access".to_string() }
    }
}

impl Default for AccessLogSource {
    fn default() -> Self { Self::new() }
}

impl LogSource for AccessLogSource {
    fn name(&self) -> &str { &self.name }

    fn parse_line(&self, line: &str) -> ParsedLine {
        let mut fields = line.split_whitespace();
        let Some(ts_str) = fields.next() else {
            return ParsedLine::Blank;
        };
        let (Some(client), Some(endpoint), Some(status_str)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return ParsedLine::Rejected(LineRejection::TooFewFields);
        };

        let Some(time_of_day) = parse_iso_time_of_day(ts_str) else {
            return ParsedLine::Rejected(LineRejection::MalformedTimestamp);
        };
        let Ok(status) = status_str.parse::<u16>() else {
            return ParsedLine::Rejected(LineRejection::NonNumericStatus);
        };

        ParsedLine::Event(LogEvent {
            time_of_day,
            client_id: client.to_string(),
            endpoint: endpoint.to_string(),
            status,
        })
    }
}

/// `2025-11-15T22:58:01Z` -> `22:58:01`.
///
/// Exactly one `T` must split date from time. The date itself is not
/// inspected; only the time of day takes part in windowing.
fn parse_iso_time_of_day(ts: &str) -> Option<TimeOfDay> {
    let (_date, time) = ts.split_once('T')?;
    if time.contains('T') {
        return None;
    }
    let caps = RE_TIME_WITH_ZONE.captures(time)?;
    TimeOfDay::parse(caps.get(1)?.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> AccessLogSource {
        AccessLogSource::new()
    }

    fn event(line: &str) -> LogEvent {
        match source().parse_line(line) {
            ParsedLine::Event(e) => e,
            other => panic!("expected event, got {:?}", other),
        }
    }

    #[test]
    fn test_parses_sample_line() {
        let e = event("2025-11-15T22:58:01Z  192.168.0.10   /login        200");
        assert_eq!(e.time_of_day, TimeOfDay::from_hms(22, 58, 1).unwrap());
        assert_eq!(e.client_id, "192.168.0.10");
        assert_eq!(e.endpoint, "/login");
        assert_eq!(e.status, 200);
    }

    #[test]
    fn test_extra_fields_ignored() {
        let e = event("2025-11-15T23:00:00Z 10.0.0.1 /admin 403 512 \"curl/8.0\"");
        assert_eq!(e.status, 403);
        assert_eq!(e.endpoint, "/admin");
    }

    #[test]
    fn test_zone_markers_stripped() {
        assert_eq!(event("2025-11-15T22:58:01 a /x 200").time_of_day.to_string(), "22:58:01");
        assert_eq!(event("2025-11-15T22:58:01+02:00 a /x 200").time_of_day.to_string(), "22:58:01");
        assert_eq!(event("2025-11-15T22:58:01-0500 a /x 200").time_of_day.to_string(), "22:58:01");
        assert_eq!(
            event("2025-11-15T22:58:01.250Z a /x 200").time_of_day,
            TimeOfDay::parse("22:58:01.250").unwrap()
        );
    }

    #[test]
    fn test_blank_lines_are_blank() {
        assert_eq!(source().parse_line(""), ParsedLine::Blank);
        assert_eq!(source().parse_line("   \t  "), ParsedLine::Blank);
    }

    #[test]
    fn test_too_few_fields() {
        assert_eq!(
            source().parse_line("2025-11-15T22:58:01Z 10.0.0.1 /login"),
            ParsedLine::Rejected(LineRejection::TooFewFields)
        );
    }

    #[test]
    fn test_missing_date_time_delimiter() {
        assert_eq!(
            source().parse_line("2025-11-15 10.0.0.1 /login 200"),
            ParsedLine::Rejected(LineRejection::MalformedTimestamp)
        );
        assert_eq!(
            source().parse_line("2025T11T15 10.0.0.1 /login 200"),
            ParsedLine::Rejected(LineRejection::MalformedTimestamp)
        );
    }

    #[test]
    fn test_bad_time_of_day() {
        assert_eq!(
            source().parse_line("2025-11-15T9:58:01Z 10.0.0.1 /login 200"),
            ParsedLine::Rejected(LineRejection::MalformedTimestamp)
        );
        assert_eq!(
            source().parse_line("2025-11-15Tnoon 10.0.0.1 /login 200"),
            ParsedLine::Rejected(LineRejection::MalformedTimestamp)
        );
    }

    #[test]
    fn test_non_numeric_status() {
        assert_eq!(
            source().parse_line("2025-11-15T22:58:01Z 10.0.0.1 /login OK"),
            ParsedLine::Rejected(LineRejection::NonNumericStatus)
        );
    }
}
