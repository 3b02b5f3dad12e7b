//! # Intruder Sweep - Core Library
//!
//! Time-windowed access log sweep for small operations teams.
//!
//! Intruder Sweep reads an access log once, keeps only the events whose time
//! of day falls inside an inspection window, aggregates what each client did
//! in that window, and reports the clients that both probed broadly and
//! succeeded against a sensitive endpoint.
//!
//! ## Pipeline
//! raw lines -> `log_sources` (parse) -> `detection::window` (filter)
//! -> `detection::aggregator` (fold) -> `detection::classifier` -> `report`
//!
//! - One bounded batch scan per invocation. Nothing is persisted.
//! - Malformed lines are counted and skipped, never fatal.
//! - Either the full report is produced or nothing is.

pub mod detection;
pub mod log_sources;
pub mod report;

use chrono::NaiveTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;
use thiserror::Error;

use crate::detection::window::InspectionWindow;
use crate::detection::ScanLimits;
use crate::log_sources::LogFormat;
use crate::report::ReportFormat;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type for Intruder Sweep.
///
/// Malformed log lines never surface here: they are recovered
/// locally by the parser (see `log_sources::LineRejection`).
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Cannot read log {}: {source}", path.display())]
    InputUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scan incomplete after {lines_read} lines: {reason}")]
    ScanIncomplete { lines_read: u64, reason: String },

    #[error("Scan worker failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

pub type SweepResult<T> = Result<T, SweepError>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Top-level configuration for Intruder Sweep.
///
/// Loaded from `intruder-sweep.toml` in the working directory or a path
/// supplied via CLI flag. Every field can be overridden on the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Inspection window bounds.
    pub window: WindowConfig,

    /// Suspicion policy knobs.
    pub policy: PolicyConfig,

    /// Input format and scan limits.
    #[serde(default)]
    pub scan: ScanConfig,

    /// Report rendering and destination.
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Inclusive start, `HH:MM:SS`.
    pub start: String,

    /// Inclusive end, `HH:MM:SS`. Must not be earlier than `start`.
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// A client must touch MORE than this many distinct endpoints.
    pub breadth_threshold: usize,

    /// Endpoints whose successful access is treated as sensitive.
    pub sensitive_endpoints: Vec<String>,

    /// Status code that counts as a successful request.
    #[serde(default = "default_success_status")]
    pub success_status: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Layout of the input log.
    pub format: LogFormat,

    /// Stop and report incomplete once this many lines have been read.
    pub max_lines: Option<u64>,

    /// Stop and report incomplete once the scan has run this long.
    pub timeout_secs: Option<u64>,

    /// Number of aggregation partitions. 1 = sequential scan.
    pub partitions: usize,

    /// Bounded queue depth between the reader and each partition.
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Text (human) or JSON rendering.
    pub format: ReportFormat,

    /// Write the report here instead of stdout.
    pub output_path: Option<PathBuf>,
}

fn default_success_status() -> u16 {
    200
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Iso,
            max_lines: None,
            timeout_secs: None,
            partitions: 1,
            queue_capacity: 1024,
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig {
                start: "22:55:00".to_string(),
                end: "23:05:00".to_string(),
            },
            policy: PolicyConfig {
                breadth_threshold: 5,
                sensitive_endpoints: vec!["/transfer".to_string(), "/admin".to_string()],
                success_status: default_success_status(),
            },
            scan: ScanConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl SweepConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> SweepResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SweepConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Write the default configuration to a TOML file.
    pub fn write_default(path: &std::path::Path) -> SweepResult<()> {
        let config = Self::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| SweepError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Parse the window bounds. Fails on unparseable or wrapping bounds.
    pub fn inspection_window(&self) -> SweepResult<InspectionWindow> {
        InspectionWindow::parse(&self.window.start, &self.window.end)
    }

    /// Build the typed suspicion policy.
    pub fn suspicion_policy(&self) -> SweepResult<SuspicionPolicy> {
        SuspicionPolicy::new(
            self.policy.breadth_threshold,
            self.policy.sensitive_endpoints.iter().cloned(),
            self.policy.success_status,
        )
    }

    /// Scan limits derived from the `[scan]` section.
    pub fn scan_limits(&self) -> ScanLimits {
        ScanLimits {
            max_lines: self.scan.max_lines,
            timeout: self.scan.timeout_secs.map(std::time::Duration::from_secs),
        }
    }

    /// Check everything that must hold before a scan may start.
    ///
    /// Invalid configuration is fatal at startup and is never discovered
    /// mid-scan.
    pub fn validate(&self) -> SweepResult<()> {
        self.inspection_window()?;
        self.suspicion_policy()?;
        if self.scan.partitions == 0 {
            return Err(SweepError::InvalidPolicy(
                "scan.partitions must be at least 1".to_string(),
            ));
        }
        if self.scan.queue_capacity == 0 {
            return Err(SweepError::InvalidPolicy(
                "scan.queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Core Types
// ---------------------------------------------------------------------------

static RE_TIME_OF_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}:\d{2}:\d{2}(?:\.\d{1,9})?$").expect("regex"));

/// Time of day with no date and no zone.
///
/// Backed by `NaiveTime`, so ordering is numeric rather than relying on
/// zero-padded string comparison. Only the fixed-width `HH:MM:SS[.fff]`
/// spelling is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    /// Parse a fixed-width `HH:MM:SS` value, optionally with fractional seconds.
    pub fn parse(text: &str) -> Option<Self> {
        if !RE_TIME_OF_DAY.is_match(text) {
            return None;
        }
        NaiveTime::parse_from_str(text, "%H:%M:%S%.f").ok().map(Self)
    }

    pub fn from_hms(hour: u32, minute: u32, second: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, second).map(Self)
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One parsed access log record.
///
/// Log parsers produce these; the aggregator consumes them and drops them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEvent {
    /// When the request happened, time of day only.
    pub time_of_day: TimeOfDay,

    /// Opaque client identity (an IP address in practice).
    pub client_id: String,

    /// Opaque endpoint / URL path.
    pub endpoint: String,

    /// Response status code.
    pub status: u16,
}

/// What makes a client a suspect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuspicionPolicy {
    /// Distinct endpoint count that must be strictly exceeded.
    pub breadth_threshold: usize,

    /// Endpoints that warrant scrutiny on successful access.
    pub sensitive_endpoints: BTreeSet<String>,

    /// Status that counts as success.
    pub success_status: u16,
}

impl SuspicionPolicy {
    /// Build a policy. An empty sensitive set can never flag anyone and is
    /// rejected as inconsistent.
    pub fn new<I, S>(
        breadth_threshold: usize,
        sensitive_endpoints: I,
        success_status: u16,
    ) -> SweepResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sensitive_endpoints: BTreeSet<String> = sensitive_endpoints
            .into_iter()
            .map(Into::into)
            .filter(|e: &String| !e.trim().is_empty())
            .collect();

        if sensitive_endpoints.is_empty() {
            return Err(SweepError::InvalidPolicy(
                "at least one sensitive endpoint is required".to_string(),
            ));
        }

        Ok(Self {
            breadth_threshold,
            sensitive_endpoints,
            success_status,
        })
    }

    pub fn is_sensitive(&self, endpoint: &str) -> bool {
        self.sensitive_endpoints.contains(endpoint)
    }

    /// True when this event is a successful hit on a sensitive endpoint.
    pub fn is_sensitive_success(&self, event: &LogEvent) -> bool {
        event.status == self.success_status && self.is_sensitive(&event.endpoint)
    }
}

/// A client whose in-window behavior satisfied the full policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suspect {
    pub client_id: String,

    /// Distinct endpoints touched inside the window.
    pub endpoint_count: usize,

    /// Sensitive endpoints that answered with the success status.
    pub sensitive_endpoints_hit: BTreeSet<String>,
}

/// Linear lifecycle of one sweep. There are no backward transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SweepPhase {
    /// Lines are being read, parsed, filtered and folded.
    Scanning,

    /// Input exhausted; aggregates frozen and classified.
    Finalizing,

    /// Suspects are being ordered into a report.
    Reporting,

    /// Report handed off. Nothing else happens.
    Done,
}

impl SweepPhase {
    /// The only phase that may follow this one.
    pub fn next(self) -> Option<Self> {
        match self {
            SweepPhase::Scanning => Some(SweepPhase::Finalizing),
            SweepPhase::Finalizing => Some(SweepPhase::Reporting),
            SweepPhase::Reporting => Some(SweepPhase::Done),
            SweepPhase::Done => None,
        }
    }
}
