//! # Sweep Engine
//!
//! Drives one bounded scan of an access log: every line is parsed, checked
//! against the inspection window, and folded into the per-client aggregator
//! before the next line is read. At end of input the aggregates are frozen,
//! classified, and ordered into a `Report`.
//!
//! The phases run strictly forward: Scanning -> Finalizing -> Reporting -> Done.
//!
//! `partition` holds the optional multi-worker variant, which shares the
//! line triage and the conclusion step with the sequential `Sweep`.

pub mod aggregator;
pub mod classifier;
pub mod partition;
pub mod window;

use serde::Serialize;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::log_sources::{self, LineRejection, LogSource, ParsedLine};
use crate::report::Report;
use crate::{LogEvent, SuspicionPolicy, SweepConfig, SweepError, SweepPhase, SweepResult};
use aggregator::{Aggregator, FinalizedAggregates};
use window::InspectionWindow;

/// Line and event counters for one sweep. Diagnostic only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Every line read, blank or not.
    pub lines_read: u64,
    pub blank_lines: u64,
    pub malformed_lines: u64,
    /// Malformed line counts keyed by rejection label.
    pub rejections: BTreeMap<String, u64>,
    pub in_window_events: u64,
    pub out_of_window_events: u64,
    /// Distinct clients with at least one in-window event.
    pub distinct_clients: usize,
}

impl ScanStats {
    pub fn record_rejection(&mut self, rejection: LineRejection) {
        self.malformed_lines += 1;
        *self.rejections.entry(rejection.label().to_string()).or_insert(0) += 1;
    }

    pub fn log_summary(&self) {
        log::info!(
            "[SCAN] {} lines read ({} blank, {} malformed), {} events in window, {} outside, {} clients",
            self.lines_read,
            self.blank_lines,
            self.malformed_lines,
            self.in_window_events,
            self.out_of_window_events,
            self.distinct_clients,
        );
        if self.malformed_lines > 0 {
            log::warn!(
                "[SCAN] Skipped {} malformed lines: {:?}",
                self.malformed_lines,
                self.rejections
            );
        }
    }
}

/// Caller-supplied cancellation surface.
///
/// Both limits are checked between lines. A read that blocks (a FIFO or a
/// stalled pipe) is not interrupted, so the timeout only bounds sources
/// that keep yielding lines, such as regular files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanLimits {
    /// Give up once this many lines were read and input remains.
    pub max_lines: Option<u64>,

    /// Give up once the scan has run this long and input remains.
    pub timeout: Option<Duration>,
}

impl ScanLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Reason the scan must stop, if a limit has been reached.
    pub fn tripped(&self, lines_read: u64, elapsed: Duration) -> Option<String> {
        if let Some(max) = self.max_lines {
            if lines_read >= max {
                return Some(format!("line limit of {} reached", max));
            }
        }
        if let Some(timeout) = self.timeout {
            if elapsed >= timeout {
                return Some(format!("timeout of {:?} reached", timeout));
            }
        }
        None
    }
}

/// How a sweep ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Input exhausted; the report covers the whole window.
    Complete(Report),

    /// A scan limit tripped first. No report is produced.
    Incomplete { lines_read: u64, reason: String },
}

impl SweepOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, SweepOutcome::Complete(_))
    }

    /// The report, or `ScanIncomplete` when the scan was cut short.
    pub fn into_report(self) -> SweepResult<Report> {
        match self {
            SweepOutcome::Complete(report) => Ok(report),
            SweepOutcome::Incomplete { lines_read, reason } => {
                Err(SweepError::ScanIncomplete { lines_read, reason })
            }
        }
    }
}

/// Parse one raw line and apply the window filter, updating counters.
///
/// Returns the event only when it should be folded.
pub(crate) fn triage(
    source: &dyn LogSource,
    window: &InspectionWindow,
    stats: &mut ScanStats,
    raw: &[u8],
) -> Option<LogEvent> {
    stats.lines_read += 1;

    let Some(line) = log_sources::decode_line(raw) else {
        log::debug!("[SCAN] line {}: not UTF-8", stats.lines_read);
        stats.record_rejection(LineRejection::InvalidEncoding);
        return None;
    };

    match source.parse_line(line) {
        ParsedLine::Blank => {
            stats.blank_lines += 1;
            None
        }
        ParsedLine::Rejected(rejection) => {
            log::debug!("[SCAN] line {}: {}", stats.lines_read, rejection.label());
            stats.record_rejection(rejection);
            None
        }
        ParsedLine::Event(event) => {
            if window.contains(event.time_of_day) {
                stats.in_window_events += 1;
                Some(event)
            } else {
                stats.out_of_window_events += 1;
                None
            }
        }
    }
}

pub(crate) fn advance(phase: &mut SweepPhase, next: SweepPhase) {
    debug_assert_eq!(phase.next(), Some(next), "sweep phases only move forward");
    log::debug!("[SCAN] phase {:?} -> {:?}", phase, next);
    *phase = next;
}

/// Finalizing -> Reporting -> Done over frozen aggregates.
pub(crate) fn conclude(
    phase: &mut SweepPhase,
    aggregates: FinalizedAggregates,
    policy: &SuspicionPolicy,
    mut stats: ScanStats,
) -> Report {
    stats.distinct_clients = aggregates.len();
    let suspects = classifier::classify(&aggregates, policy);

    advance(phase, SweepPhase::Reporting);
    stats.log_summary();
    let report = Report::new(suspects, policy.success_status, stats);
    log::info!("[REPORT] {} suspects", report.suspects().len());

    advance(phase, SweepPhase::Done);
    report
}

/// Sequential, single-owner sweep.
pub struct Sweep {
    source: Box<dyn LogSource>,
    window: InspectionWindow,
    policy: SuspicionPolicy,
    limits: ScanLimits,
    aggregator: Aggregator,
    stats: ScanStats,
    phase: SweepPhase,
}

impl Sweep {
    pub fn new(source: Box<dyn LogSource>, window: InspectionWindow, policy: SuspicionPolicy) -> Self {
        let aggregator = Aggregator::new(&policy);
        Self {
            source,
            window,
            policy,
            limits: ScanLimits::unlimited(),
            aggregator,
            stats: ScanStats::default(),
            phase: SweepPhase::Scanning,
        }
    }

    /// Build a sweep from validated configuration.
    pub fn from_config(config: &SweepConfig) -> SweepResult<Self> {
        config.validate()?;
        let sweep = Self::new(
            log_sources::source_for_format(config.scan.format),
            config.inspection_window()?,
            config.suspicion_policy()?,
        )
        .with_limits(config.scan_limits());
        Ok(sweep)
    }

    pub fn with_limits(mut self, limits: ScanLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn phase(&self) -> SweepPhase {
        self.phase
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    /// Parse, filter and fold one raw line.
    pub fn feed_line(&mut self, raw: &[u8]) {
        if let Some(event) = triage(self.source.as_ref(), &self.window, &mut self.stats, raw) {
            self.aggregator.fold(event);
        }
    }

    /// End of input: freeze, classify and order.
    pub fn finish(mut self) -> Report {
        advance(&mut self.phase, SweepPhase::Finalizing);
        let aggregates = self.aggregator.finalize();
        conclude(&mut self.phase, aggregates, &self.policy, self.stats)
    }

    /// Scan `reader` to the end, or until a limit trips while input remains.
    ///
    /// Read errors abort the sweep with no report.
    pub fn run<R: BufRead>(mut self, mut reader: R) -> SweepResult<SweepOutcome> {
        log::info!(
            "[SCAN] Sweeping {} log, window [{}, {}]",
            self.source.name(),
            self.window.start(),
            self.window.end()
        );
        let started = Instant::now();
        let mut buf = Vec::new();

        loop {
            if let Some(reason) = self.limits.tripped(self.stats.lines_read, started.elapsed()) {
                if reader.fill_buf()?.is_empty() {
                    break;
                }
                log::warn!("[SCAN] Abandoned after {} lines: {}", self.stats.lines_read, reason);
                return Ok(SweepOutcome::Incomplete {
                    lines_read: self.stats.lines_read,
                    reason,
                });
            }

            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            self.feed_line(&buf);
        }

        Ok(SweepOutcome::Complete(self.finish()))
    }
}

/// Sweep any buffered reader with the given configuration, sequentially.
pub fn sweep_reader<R: BufRead>(reader: R, config: &SweepConfig) -> SweepResult<SweepOutcome> {
    Sweep::from_config(config)?.run(reader)
}

/// Sweep a log file, sequentially or partitioned per `scan.partitions`.
///
/// Configuration is validated and the file opened before any line is read.
pub async fn sweep_file(path: &Path, config: &SweepConfig) -> SweepResult<SweepOutcome> {
    config.validate()?;

    if config.scan.partitions > 1 {
        return partition::sweep_file_partitioned(path, config).await;
    }

    let reader = log_sources::open_log(path)?;
    let sweep = Sweep::from_config(config)?;
    tokio::task::spawn_blocking(move || sweep.run(reader))
        .await
        .map_err(|e| SweepError::Worker(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_sources::access_log::AccessLogSource;
    use std::io::Cursor;

    fn sweep() -> Sweep {
        Sweep::new(
            Box::new(AccessLogSource::new()),
            InspectionWindow::parse("22:55:00", "23:05:00").unwrap(),
            SuspicionPolicy::new(5, ["/transfer", "/admin"], 200).unwrap(),
        )
    }

    fn run(input: &str) -> Report {
        sweep()
            .run(Cursor::new(input.as_bytes().to_vec()))
            .unwrap()
            .into_report()
            .unwrap()
    }

    #[test]
    fn test_stats_count_every_kind_of_line() {
        let input = "\
2025-11-15T22:58:01Z 10.0.0.1 /a 200

garbage
2025-11-15T22:58:01Z 10.0.0.1 /a OK
2025-11-15T21:00:00Z 10.0.0.2 /b 200
2025-11-15T23:00:00Z 10.0.0.3 /c 200
";
        let report = run(input);
        let stats = report.stats();
        assert_eq!(stats.lines_read, 6);
        assert_eq!(stats.blank_lines, 1);
        assert_eq!(stats.malformed_lines, 2);
        assert_eq!(stats.rejections.get("too_few_fields"), Some(&1));
        assert_eq!(stats.rejections.get("non_numeric_status"), Some(&1));
        assert_eq!(stats.in_window_events, 2);
        assert_eq!(stats.out_of_window_events, 1);
        assert_eq!(stats.distinct_clients, 2);
    }

    #[test]
    fn test_invalid_utf8_is_malformed_not_fatal() {
        let mut input = b"2025-11-15T22:58:01Z 10.0.0.1 /a 200\n".to_vec();
        input.extend_from_slice(&[0xff, 0xfe, b'\n']);
        input.extend_from_slice(b"2025-11-15T22:58:02Z 10.0.0.1 /b 200\n");
        let report = sweep().run(Cursor::new(input)).unwrap().into_report().unwrap();
        assert_eq!(report.stats().rejections.get("invalid_encoding"), Some(&1));
        assert_eq!(report.stats().in_window_events, 2);
    }

    #[test]
    fn test_last_line_without_newline() {
        let report = run("2025-11-15T22:58:01Z 10.0.0.1 /a 200");
        assert_eq!(report.stats().in_window_events, 1);
    }

    #[test]
    fn test_feed_line_stays_scanning() {
        let mut s = sweep();
        s.feed_line(b"2025-11-15T22:58:01Z 10.0.0.1 /a 200\n");
        assert_eq!(s.phase(), SweepPhase::Scanning);
        assert_eq!(s.stats().in_window_events, 1);
        let report = s.finish();
        assert!(report.is_empty());
    }

    #[test]
    fn test_max_lines_with_remaining_input_is_incomplete() {
        let input = "\
2025-11-15T22:58:01Z 10.0.0.1 /a 200
2025-11-15T22:58:02Z 10.0.0.1 /b 200
2025-11-15T22:58:03Z 10.0.0.1 /c 200
";
        let outcome = sweep()
            .with_limits(ScanLimits { max_lines: Some(2), timeout: None })
            .run(Cursor::new(input.as_bytes().to_vec()))
            .unwrap();
        assert_eq!(
            outcome,
            SweepOutcome::Incomplete {
                lines_read: 2,
                reason: "line limit of 2 reached".to_string()
            }
        );
        assert!(matches!(
            outcome.into_report(),
            Err(SweepError::ScanIncomplete { lines_read: 2, .. })
        ));
    }

    #[test]
    fn test_max_lines_equal_to_input_is_complete() {
        let input = "\
2025-11-15T22:58:01Z 10.0.0.1 /a 200
2025-11-15T22:58:02Z 10.0.0.1 /b 200
";
        let outcome = sweep()
            .with_limits(ScanLimits { max_lines: Some(2), timeout: None })
            .run(Cursor::new(input.as_bytes().to_vec()))
            .unwrap();
        assert!(outcome.is_complete());
    }

    #[test]
    fn test_zero_timeout_with_input_is_incomplete() {
        let outcome = sweep()
            .with_limits(ScanLimits { max_lines: None, timeout: Some(Duration::ZERO) })
            .run(Cursor::new(b"2025-11-15T22:58:01Z 10.0.0.1 /a 200\n".to_vec()))
            .unwrap();
        assert!(!outcome.is_complete());
    }

    #[test]
    fn test_limits_tripped() {
        let limits = ScanLimits { max_lines: Some(10), timeout: Some(Duration::from_secs(5)) };
        assert!(limits.tripped(9, Duration::from_secs(1)).is_none());
        assert!(limits.tripped(10, Duration::from_secs(1)).is_some());
        assert!(limits.tripped(0, Duration::from_secs(5)).is_some());
        assert!(ScanLimits::unlimited().tripped(u64::MAX, Duration::MAX).is_none());
    }
}
