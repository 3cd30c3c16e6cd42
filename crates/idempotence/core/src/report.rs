//! Suite reporting

use crate::types::{ProbeCategory, VerdictStatus};
use crate::verdict::Verdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Report summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub warned: usize,
    pub skipped: usize,
    /// Probes never run because an earlier one failed with fail-fast on.
    pub not_run: usize,
    pub idempotent: bool,
}

/// Verdicts for every probe of a suite run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub suite_name: String,
    pub timestamp: DateTime<Utc>,
    pub duration: Duration,
    pub verdicts: Vec<Verdict>,
    pub summary: ReportSummary,
}

impl SuiteReport {
    pub fn new(suite_name: impl Into<String>) -> Self {
        Self {
            suite_name: suite_name.into(),
            timestamp: Utc::now(),
            duration: Duration::ZERO,
            verdicts: Vec::new(),
            summary: ReportSummary::default(),
        }
    }

    pub fn add_verdict(&mut self, verdict: Verdict) {
        self.verdicts.push(verdict);
    }

    /// Compute the summary; `not_run` counts probes cut off by fail-fast.
    pub fn finalize(&mut self, not_run: usize) {
        let mut summary = ReportSummary {
            total: self.verdicts.len() + not_run,
            not_run,
            ..Default::default()
        };

        for verdict in &self.verdicts {
            match verdict.status {
                VerdictStatus::Pass => summary.passed += 1,
                VerdictStatus::Fail => summary.failed += 1,
                VerdictStatus::Warn => summary.warned += 1,
                VerdictStatus::Skip => summary.skipped += 1,
            }
        }
        summary.idempotent = summary.failed == 0;
        self.summary = summary;
    }

    pub fn is_idempotent(&self) -> bool {
        self.summary.idempotent
    }

    pub fn failures(&self) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter().filter(|v| v.is_failure())
    }

    /// Verdicts grouped by category, categories in declaration order.
    pub fn by_category(&self) -> BTreeMap<ProbeCategory, Vec<&Verdict>> {
        let mut grouped: BTreeMap<ProbeCategory, Vec<&Verdict>> = BTreeMap::new();
        for verdict in &self.verdicts {
            grouped.entry(verdict.category).or_default().push(verdict);
        }
        grouped
    }

    /// Generate a text report
    pub fn to_text(&self) -> String {
        let rule = "═".repeat(62);
        let thin = "─".repeat(62);
        let mut output = String::new();

        output.push_str(&format!("{}\n", rule));
        output.push_str("  Idempotence Report\n");
        output.push_str(&format!("{}\n", rule));
        output.push_str(&format!("  Suite: {}\n", self.suite_name));
        output.push_str(&format!(
            "  Timestamp: {}\n",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        output.push_str(&format!("  Duration: {:?}\n", self.duration));
        output.push_str(&format!("{}\n", rule));

        for (category, verdicts) in self.by_category() {
            output.push_str(&format!("  {} Probes:\n", category));
            output.push_str(&format!("{}\n", thin));

            for verdict in verdicts {
                output.push_str(&format!(
                    "  {} {:<44} {}/{} runs {:>10?}\n",
                    verdict.status.icon(),
                    verdict.probe,
                    verdict.runs_completed,
                    verdict.runs_requested,
                    verdict.duration
                ));
                if !verdict.description.is_empty() {
                    output.push_str(&format!("      {}\n", verdict.description));
                }
                if let Some(reason) = &verdict.reason {
                    let label = match verdict.status {
                        VerdictStatus::Skip => "Skipped",
                        _ => "Error",
                    };
                    output.push_str(&format!("      {}: {}\n", label, reason));
                }
                for warning in &verdict.warnings {
                    output.push_str(&format!("      Warning: {}\n", warning));
                }
                if verdict.is_failure() {
                    if let Some(captured) = verdict.output.as_deref().filter(|o| !o.is_empty()) {
                        output.push_str("      Output:\n");
                        for line in captured.lines() {
                            output.push_str(&format!("        | {}\n", line));
                        }
                    }
                }
            }
            output.push_str(&format!("{}\n", thin));
        }

        output.push_str(&format!(
            "  Total: {}  Passed: {}  Failed: {}  Warned: {}  Skipped: {}",
            self.summary.total,
            self.summary.passed,
            self.summary.failed,
            self.summary.warned,
            self.summary.skipped
        ));
        if self.summary.not_run > 0 {
            output.push_str(&format!("  Not run: {}", self.summary.not_run));
        }
        output.push('\n');

        if self.summary.idempotent {
            output.push_str("  Result: ✓ IDEMPOTENT\n");
        } else {
            output.push_str("  Result: ✗ NOT IDEMPOTENT\n");
        }
        output.push_str(&format!("{}\n", rule));

        output
    }

    /// Generate JSON report
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Generate YAML report
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SuiteReport {
        let mut report = SuiteReport::new("setup");
        report.add_verdict(Verdict::passed(
            "setup_env.sh",
            ProbeCategory::Script,
            3,
            Duration::from_millis(10),
        ));
        report.add_verdict(
            Verdict::failed("append.sh", ProbeCategory::Script, 3, 2, "run 2 changed path:x")
                .with_output("appending\n"),
        );
        report.add_verdict(Verdict::skipped(
            "make_lint",
            ProbeCategory::BuildTarget,
            2,
            "target not found: Makefile",
        ));
        report
    }

    #[test]
    fn test_report_finalize() {
        let mut report = sample();
        report.finalize(1);

        assert_eq!(report.summary.total, 4);
        assert_eq!(report.summary.passed, 1);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.skipped, 1);
        assert_eq!(report.summary.not_run, 1);
        assert!(!report.is_idempotent());
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn test_skips_and_warnings_stay_idempotent() {
        let mut report = SuiteReport::new("lenient");
        report.add_verdict(Verdict::skipped("x", ProbeCategory::Script, 2, "missing"));
        report.add_verdict(Verdict::warned(
            "make_doctor",
            ProbeCategory::BuildTarget,
            2,
            vec!["first run failed (exit 2)".into()],
            Duration::ZERO,
        ));
        report.finalize(0);
        assert!(report.is_idempotent());
        assert_eq!(report.summary.warned, 1);
    }

    #[test]
    fn test_report_to_text() {
        let mut report = sample();
        report.finalize(0);

        let text = report.to_text();
        assert!(text.contains("Suite: setup"));
        assert!(text.contains("Script Probes:"));
        assert!(text.contains("Build Target Probes:"));
        assert!(text.contains("| appending"));
        assert!(text.contains("NOT IDEMPOTENT"));
    }

    #[test]
    fn test_report_to_json() {
        let mut report = sample();
        report.finalize(0);
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["summary"]["failed"], 1);
        assert_eq!(json["verdicts"][1]["runs_completed"], 2);
    }
}
