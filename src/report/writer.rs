//! # Report Writer
//!
//! Delivers a rendered report to its destination: stdout, or a file when
//! `report.output_path` is set. Files are replaced, never appended to.

use std::io::Write;
use std::path::Path;

use crate::report::{Report, ReportFormat};
use crate::SweepResult;

/// Write the rendered report to `path`, creating parent directories.
pub fn write_report_file(path: &Path, rendered: &str) -> SweepResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = std::fs::File::create(path)?;
    file.write_all(rendered.as_bytes())?;
    file.flush()?;

    log::info!("[REPORT] Written to {} ({} bytes)", path.display(), rendered.len());
    Ok(())
}

/// Render and deliver the report.
pub fn deliver(report: &Report, format: ReportFormat, output_path: Option<&Path>) -> SweepResult<()> {
    let rendered = report.render(format)?;
    match output_path {
        Some(path) => write_report_file(path, &rendered),
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(rendered.as_bytes())?;
            handle.flush()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::ScanStats;

    #[test]
    fn test_write_creates_parent_and_replaces() {
        let dir = std::env::temp_dir()
            .join("intruder-sweep-unit")
            .join("writer");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("nested").join("report.txt");

        write_report_file(&path, "first\n").expect("write");
        write_report_file(&path, "second\n").expect("rewrite");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second\n");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_deliver_to_file() {
        let dir = std::env::temp_dir()
            .join("intruder-sweep-unit")
            .join("deliver");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("report.txt");

        let report = Report::new(vec![], 200, ScanStats::default());
        deliver(&report, ReportFormat::Text, Some(&path)).expect("deliver");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Suspected IPs:\n- (none)\n");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
