//! Parser for Apache/Nginx combined access log format.
//!
//! Format: `IP - - [DD/Mon/YYYY:HH:MM:SS +ZZZZ] "METHOD /path HTTP/x.x" status size "referer" "user-agent"`
//!
//! The time of day is taken literally from the bracketed timestamp. The
//! offset is dropped, not applied: all lines of one log share a zone.
//!
//! Copyright (c) 2026 CIPS Corps. All rights reserved.

use crate::log_sources::{LineRejection, LogSource, ParsedLine};
use crate::{LogEvent, TimeOfDay};
use regex::Regex;
use std::sync::LazyLock;

static RE_COMBINED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\S+) \S+ \S+ \[([^\]]+)\] "(\S+) (\S+)(?: \S+)?" (\S+) (\S+)"#)
        .expect("regex")
});

static RE_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{2}/[A-Z][a-z]{2}/\d{4}:(\d{2}:\d{2}:\d{2})(?: [+-]\d{4})?$").expect("regex")
});

pub struct WebLogSource {
    name: String,
}

impl WebLogSource {
    pub fn new() -> Self {
        Self { name: "combined-access".to_string() }
    }
}

impl Default for WebLogSource {
    fn default() -> Self { Self::new() }
}

impl LogSource for WebLogSource {
    fn name(&self) -> &str { &self.name }

    fn parse_line(&self, line: &str) -> ParsedLine {
        let line = line.trim();
        if line.is_empty() {
            return ParsedLine::Blank;
        }
        let Some(caps) = RE_COMBINED.captures(line) else {
            return ParsedLine::Rejected(LineRejection::UnrecognizedLayout);
        };
        let (Some(client), Some(ts_str), Some(path), Some(status_str)) =
            (caps.get(1), caps.get(2), caps.get(4), caps.get(5))
        else {
            return ParsedLine::Rejected(LineRejection::UnrecognizedLayout);
        };

        let Some(time_of_day) = parse_combined_time_of_day(ts_str.as_str()) else {
            return ParsedLine::Rejected(LineRejection::MalformedTimestamp);
        };
        let Ok(status) = status_str.as_str().parse::<u16>() else {
            return ParsedLine::Rejected(LineRejection::NonNumericStatus);
        };

        ParsedLine::Event(LogEvent {
            time_of_day,
            client_id: client.as_str().to_string(),
            endpoint: path.as_str().to_string(),
            status,
        })
    }
}

fn parse_combined_time_of_day(ts: &str) -> Option<TimeOfDay> {
    let caps = RE_TIMESTAMP.captures(ts)?;
    TimeOfDay::parse(caps.get(1)?.as_str())
}
