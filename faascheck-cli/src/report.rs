//! Run report export
//!
//! A finished run is written to `report_dir` as two files:
//!
//! * `report.json` -- run metadata plus the full result ledger snapshot
//! * `summary.txt` -- the same content as plain text, without colors
//!
//! The console rendering uses the same text layout with colored status labels.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use tracing::info;

use faascheck_core::ledger::LedgerSnapshot;
use faascheck_core::types::{OutcomeStatus, Severity};
use faascheck_engine::CleanupReport;

use crate::error::CliError;
use crate::output::Render;

/// Machine-readable report file name.
pub const REPORT_JSON: &str = "report.json";

/// Human-readable summary file name.
pub const SUMMARY_TXT: &str = "summary.txt";

const ACTUAL_WIDTH: usize = 36;

/// Everything known about one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub suites: Vec<String>,
    pub faults: Vec<String>,
    pub interrupted: bool,
    /// Why the run stopped early, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
    pub cleanup: CleanupReport,
    #[serde(flatten)]
    pub ledger: LedgerSnapshot,
}

/// Paths of the files written by [`write_report`].
#[derive(Debug, Clone, Serialize)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub summary: PathBuf,
}

impl RunReport {
    /// Wall-clock duration of the run in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Write the text layout. `color` switches ANSI status labels on.
    pub fn write_summary(&self, w: &mut dyn Write, color: bool) -> std::io::Result<()> {
        let counts = &self.ledger.counts;

        writeln!(w, "faascheck run {} against {}", self.run_id, self.target)?;
        writeln!(
            w,
            "started {}  duration {}ms",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.duration_ms()
        )?;
        if !self.faults.is_empty() {
            writeln!(w, "faults: {}", self.faults.join(", "))?;
        }
        writeln!(w)?;

        writeln!(
            w,
            "{:<28} {:<6} {:>8}  {:<14} {:<width$} NAME",
            "ID",
            "STATUS",
            "MS",
            "EXPECTED",
            "ACTUAL",
            width = ACTUAL_WIDTH
        )?;
        writeln!(w, "{}", "-".repeat(110))?;
        for outcome in &self.ledger.outcomes {
            writeln!(
                w,
                "{:<28} {} {:>8}  {:<14} {:<width$} {}",
                outcome.id,
                status_label(outcome.status, color),
                outcome.duration_ms,
                outcome.expected,
                clip(&outcome.actual, ACTUAL_WIDTH),
                outcome.name,
                width = ACTUAL_WIDTH
            )?;
            if outcome.status != OutcomeStatus::Pass {
                if let Some(message) = &outcome.message {
                    writeln!(w, "{:<28} {}", "", message)?;
                }
            }
        }
        writeln!(w)?;

        if !self.ledger.issues.is_empty() {
            writeln!(w, "Issues ({}):", self.ledger.issues.len())?;
            for issue in &self.ledger.issues {
                writeln!(
                    w,
                    "  [{}] {}: {}",
                    severity_label(issue.severity, color),
                    issue.title,
                    issue.description
                )?;
            }
            writeln!(w)?;
        }

        if !self.ledger.metrics.is_empty() {
            writeln!(w, "Metrics:")?;
            for metric in &self.ledger.metrics {
                writeln!(w, "  {:<32} {:>12.2}", metric.name, metric.value)?;
            }
            writeln!(w)?;
        }

        writeln!(
            w,
            "Cleanup: {} released, {} already gone, {} failed",
            self.cleanup.released, self.cleanup.already_gone, self.cleanup.failed
        )?;
        if let Some(reason) = &self.aborted {
            writeln!(w, "Aborted: {reason}")?;
        }
        if self.interrupted {
            writeln!(w, "Run was interrupted before all suites finished.")?;
        }
        writeln!(
            w,
            "Total {}  passed {}  failed {}  skipped {}  (pass rate {:.1}%)",
            counts.total, counts.passed, counts.failed, counts.skipped, self.ledger.pass_rate
        )?;
        Ok(())
    }
}

impl Render for RunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        self.write_summary(w, true)
    }
}

/// Write `report.json` and `summary.txt` into `dir`, creating it if needed.
pub async fn write_report(report: &RunReport, dir: &Path) -> Result<ReportPaths, CliError> {
    tokio::fs::create_dir_all(dir).await?;

    let json = dir.join(REPORT_JSON);
    let mut body = serde_json::to_vec_pretty(report)?;
    body.push(b'\n');
    tokio::fs::write(&json, body).await?;

    let summary = dir.join(SUMMARY_TXT);
    let mut text = Vec::new();
    report.write_summary(&mut text, false)?;
    tokio::fs::write(&summary, text).await?;

    info!(dir = %dir.display(), "report written");
    Ok(ReportPaths { json, summary })
}

fn status_label(status: OutcomeStatus, color: bool) -> String {
    let label = format!("{:<6}", status.to_string());
    if !color {
        return label;
    }
    match status {
        OutcomeStatus::Pass => label.green().bold().to_string(),
        OutcomeStatus::Fail => label.red().bold().to_string(),
        OutcomeStatus::Skip => label.yellow().to_string(),
    }
}

fn severity_label(severity: Severity, color: bool) -> String {
    let label = severity.to_string();
    if !color {
        return label;
    }
    match severity {
        Severity::Critical => label.red().bold().to_string(),
        Severity::High => label.red().to_string(),
        Severity::Medium => label.yellow().to_string(),
        Severity::Low => label.normal().to_string(),
    }
}

fn clip(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_owned();
    }
    let kept: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use faascheck_core::ledger::ResultLedger;
    use faascheck_core::types::{Issue, TestOutcome};
    use tempfile::TempDir;

    fn sample_report() -> RunReport {
        let ledger = ResultLedger::new();
        ledger.record(TestOutcome::pass("health.1", "gateway reachable", "health", "200", "200"));
        ledger.record(
            TestOutcome::fail("cascade.2", "linked callback removed", "cascade", "404", "200")
                .with_message("callback 7 still present"),
        );
        ledger.record(TestOutcome::skip(
            "fault-oom_killed.2",
            "detect OOMKilled",
            "faults",
            "OOMKilled",
            "not observed",
        ));
        ledger.record_issue(Issue::new(
            Severity::High,
            "Cascade delete missing",
            "callback survived chatroom delete",
        ));
        ledger
            .record_metric("p95_latency_ms", 41.5)
            .expect("finite metric");

        let started_at = Utc::now();
        RunReport {
            run_id: "run-1".to_owned(),
            target: "http://localhost:8000".to_owned(),
            started_at,
            finished_at: started_at + chrono::Duration::milliseconds(1500),
            suites: vec!["health".to_owned(), "cascade".to_owned()],
            faults: vec!["oom_killed".to_owned()],
            interrupted: false,
            aborted: None,
            cleanup: CleanupReport {
                released: 3,
                already_gone: 1,
                failed: 0,
            },
            ledger: ledger.snapshot(),
        }
    }

    #[test]
    fn test_summary_lists_every_outcome_and_issue() {
        let report = sample_report();
        let mut buffer = Vec::new();
        report
            .write_summary(&mut buffer, false)
            .expect("summary rendering should succeed");
        let text = String::from_utf8(buffer).expect("valid UTF-8");

        assert!(text.contains("health.1"));
        assert!(text.contains("FAIL"));
        assert!(text.contains("callback 7 still present"));
        assert!(text.contains("[High] Cascade delete missing"));
        assert!(text.contains("p95_latency_ms"));
        assert!(text.contains("Cleanup: 3 released, 1 already gone, 0 failed"));
        assert!(text.contains("Total 3  passed 1  failed 1  skipped 1"));
        assert!(!text.contains('\u{1b}'), "plain summary must not carry ANSI codes");
    }

    #[test]
    fn test_json_flattens_ledger_snapshot() {
        let report = sample_report();
        let value = serde_json::to_value(&report).expect("report serializes");
        assert_eq!(value["run_id"], "run-1");
        assert_eq!(value["counts"]["total"], 3);
        assert_eq!(value["counts"]["failed"], 1);
        assert_eq!(value["outcomes"].as_array().map(Vec::len), Some(3));
        assert_eq!(value["cleanup"]["released"], 3);
        assert!(value.get("aborted").is_none(), "absent abort reason is omitted");
    }

    #[tokio::test]
    async fn test_write_report_creates_both_files() {
        let dir = TempDir::new().expect("should create temp dir");
        let target = dir.path().join("nested").join("reports");

        let paths = write_report(&sample_report(), &target)
            .await
            .expect("report should be written");

        let json = std::fs::read_to_string(&paths.json).expect("report.json exists");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");
        assert_eq!(parsed["counts"]["skipped"], 1);

        let summary = std::fs::read_to_string(&paths.summary).expect("summary.txt exists");
        assert!(summary.starts_with("faascheck run run-1"));
        assert_eq!(paths.summary.file_name().and_then(|n| n.to_str()), Some(SUMMARY_TXT));
    }

    #[test]
    fn test_clip_long_actual() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("abcdefghijklmnop", 8), "abcde...");
    }
}
