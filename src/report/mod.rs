//! # Reporter
//!
//! Orders the suspect set and renders it. Output is a pure function of the
//! suspects, the success status, and the scan statistics, so the same input
//! always yields byte-identical reports.
//!
//! Text layout:
//! ```text
//! Suspected IPs:
//! - 10.0.0.1 (6 endpoints, accessed /admin, /transfer with 200)
//! ```
//! An empty suspect set still prints the header followed by `- (none)`, so a
//! clean run is distinguishable from one that never ran.

pub mod writer;

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::detection::ScanStats;
use crate::{Suspect, SweepError, SweepResult};

pub const REPORT_HEADER: &str = "Suspected IPs:";
pub const NO_FINDINGS: &str = "- (none)";

/// How the report is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(SweepError::Config(format!(
                "unknown report format '{}', expected 'text' or 'json'",
                other
            ))),
        }
    }
}

/// A completed sweep's findings in report order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    success_status: u16,
    suspects: Vec<Suspect>,
    stats: ScanStats,
}

impl Report {
    /// Sort suspects by client id and freeze them into a report.
    pub fn new(mut suspects: Vec<Suspect>, success_status: u16, stats: ScanStats) -> Self {
        suspects.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        Self {
            success_status,
            suspects,
            stats,
        }
    }

    pub fn suspects(&self) -> &[Suspect] {
        &self.suspects
    }

    pub fn is_empty(&self) -> bool {
        self.suspects.is_empty()
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    pub fn success_status(&self) -> u16 {
        self.success_status
    }

    /// Header, then one line per suspect or the no-findings marker.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(REPORT_HEADER);
        out.push('\n');
        if self.suspects.is_empty() {
            out.push_str(NO_FINDINGS);
            out.push('\n');
            return out;
        }
        for suspect in &self.suspects {
            let _ = writeln!(out, "{}", format_suspect_line(suspect, self.success_status));
        }
        out
    }

    /// Pretty JSON with the same ordering as the text form.
    pub fn render_json(&self) -> SweepResult<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn render(&self, format: ReportFormat) -> SweepResult<String> {
        match format {
            ReportFormat::Text => Ok(self.render_text()),
            ReportFormat::Json => self.render_json(),
        }
    }
}

/// `- <client> (<n> endpoints, accessed <sorted, comma-joined> with <status>)`
pub fn format_suspect_line(suspect: &Suspect, success_status: u16) -> String {
    // BTreeSet iterates in ascending order.
    let paths: Vec<&str> = suspect
        .sensitive_endpoints_hit
        .iter()
        .map(String::as_str)
        .collect();
    format!(
        "- {} ({} endpoints, accessed {} with {})",
        suspect.client_id,
        suspect.endpoint_count,
        paths.join(", "),
        success_status
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn suspect(client: &str, count: usize, hit: &[&str]) -> Suspect {
        Suspect {
            client_id: client.to_string(),
            endpoint_count: count,
            sensitive_endpoints_hit: hit.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn test_empty_report_has_marker() {
        let report = Report::new(vec![], 200, ScanStats::default());
        assert_eq!(report.render_text(), "Suspected IPs:\n- (none)\n");
    }

    #[test]
    fn test_suspect_line_format() {
        let s = suspect("10.0.0.1", 6, &["/transfer", "/admin"]);
        assert_eq!(
            format_suspect_line(&s, 200),
            "- 10.0.0.1 (6 endpoints, accessed /admin, /transfer with 200)"
        );
    }

    #[test]
    fn test_suspects_sorted_by_client() {
        let report = Report::new(
            vec![
                suspect("192.168.0.9", 7, &["/admin"]),
                suspect("10.0.0.2", 6, &["/transfer"]),
                suspect("10.0.0.10", 8, &["/admin"]),
            ],
            200,
            ScanStats::default(),
        );
        let ids: Vec<&str> = report.suspects().iter().map(|s| s.client_id.as_str()).collect();
        // Byte-lexicographic, not numeric.
        assert_eq!(ids, vec!["10.0.0.10", "10.0.0.2", "192.168.0.9"]);
        assert_eq!(
            report.render_text(),
            "Suspected IPs:\n\
             - 10.0.0.10 (8 endpoints, accessed /admin with 200)\n\
             - 10.0.0.2 (6 endpoints, accessed /transfer with 200)\n\
             - 192.168.0.9 (7 endpoints, accessed /admin with 200)\n"
        );
    }

    #[test]
    fn test_json_rendering() {
        let report = Report::new(vec![suspect("10.0.0.1", 6, &["/transfer"])], 200, ScanStats::default());
        let value: serde_json::Value =
            serde_json::from_str(&report.render(ReportFormat::Json).unwrap()).unwrap();
        assert_eq!(value["success_status"], 200);
        assert_eq!(value["suspects"][0]["client_id"], "10.0.0.1");
        assert_eq!(value["suspects"][0]["endpoint_count"], 6);
        assert_eq!(value["suspects"][0]["sensitive_endpoints_hit"][0], "/transfer");
    }

    #[test]
    fn test_report_format_from_str() {
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("xml".parse::<ReportFormat>().is_err());
    }
}
