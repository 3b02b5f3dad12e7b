//! Log source abstraction layer for Intruder Sweep.
//!
//! Copyright (c) 2026 CIPS Corps. All rights reserved.

pub mod access_log;
pub mod web_log;

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::{LogEvent, SweepError, SweepResult};

/// Why a non-blank line was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LineRejection {
    /// Fewer whitespace-separated fields than the layout needs.
    TooFewFields,
    /// Timestamp missing the date/time delimiter or carrying a bad time of day.
    MalformedTimestamp,
    /// Status field is not an integer.
    NonNumericStatus,
    /// Line does not match the expected layout at all.
    UnrecognizedLayout,
    /// Line is not valid UTF-8.
    InvalidEncoding,
}

impl LineRejection {
    pub fn label(&self) -> &'static str {
        match self {
            LineRejection::TooFewFields => "too_few_fields",
            LineRejection::MalformedTimestamp => "malformed_timestamp",
            LineRejection::NonNumericStatus => "non_numeric_status",
            LineRejection::UnrecognizedLayout => "unrecognized_layout",
            LineRejection::InvalidEncoding => "invalid_encoding",
        }
    }
}

/// Result of parsing one raw line. Parsing never fails the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// Empty or whitespace-only. Skipped, not counted as malformed.
    Blank,
    Event(LogEvent),
    Rejected(LineRejection),
}

pub trait LogSource: Send + Sync {
    fn name(&self) -> &str;
    fn parse_line(&self, line: &str) -> ParsedLine;
}

/// Supported input layouts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `<ISO-8601 timestamp> <client> <endpoint> <status>`
    #[default]
    Iso,
    /// Apache/Nginx combined access log.
    Combined,
}

impl std::str::FromStr for LogFormat {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "iso" => Ok(LogFormat::Iso),
            "combined" => Ok(LogFormat::Combined),
            other => Err(SweepError::Config(format!(
                "unknown log format '{}', expected 'iso' or 'combined'",
                other
            ))),
        }
    }
}

/// Build the parser for a log layout.
pub fn source_for_format(format: LogFormat) -> Box<dyn LogSource> {
    let source: Box<dyn LogSource> = match format {
        LogFormat::Iso => Box::new(access_log::AccessLogSource::new()),
        LogFormat::Combined => Box::new(web_log::WebLogSource::new()),
    };
    log::debug!("Using log source: {}", source.name());
    source
}

/// Open a log file for a sequential scan.
///
/// Failure here is fatal: nothing has been read and no report is produced.
pub fn open_log(path: &Path) -> SweepResult<BufReader<File>> {
    let file = File::open(path).map_err(|source| SweepError::InputUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

/// Decode one raw line (terminator included or not) for parsing.
///
/// Returns `None` when the bytes are not UTF-8.
pub fn decode_line(raw: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(raw).ok()?;
    Some(text.trim_end_matches(['\n', '\r']))
}
