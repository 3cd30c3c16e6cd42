//! Verdicts: the outcome of verifying one probe.

use crate::observation::Divergence;
use crate::types::{ProbeCategory, VerdictStatus};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of an idempotence check for a single probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub probe: String,
    pub description: String,
    pub category: ProbeCategory,
    pub status: VerdictStatus,
    pub runs_requested: u32,
    pub runs_completed: u32,
    pub reason: Option<String>,
    pub divergence: Option<Divergence>,
    /// Combined output of the run that failed or diverged.
    pub output: Option<String>,
    pub warnings: Vec<String>,
    pub duration: Duration,
}

impl Verdict {
    fn base(
        probe: impl Into<String>,
        category: ProbeCategory,
        status: VerdictStatus,
        runs_requested: u32,
    ) -> Self {
        Self {
            probe: probe.into(),
            description: String::new(),
            category,
            status,
            runs_requested,
            runs_completed: 0,
            reason: None,
            divergence: None,
            output: None,
            warnings: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// All runs succeeded without significant change.
    pub fn passed(
        probe: impl Into<String>,
        category: ProbeCategory,
        runs: u32,
        duration: Duration,
    ) -> Self {
        let mut verdict = Self::base(probe, category, VerdictStatus::Pass, runs);
        verdict.runs_completed = runs;
        verdict.duration = duration;
        verdict
    }

    /// A run failed or diverged; `runs_completed` includes the offending run.
    pub fn failed(
        probe: impl Into<String>,
        category: ProbeCategory,
        runs_requested: u32,
        runs_completed: u32,
        reason: impl Into<String>,
    ) -> Self {
        let mut verdict = Self::base(probe, category, VerdictStatus::Fail, runs_requested);
        verdict.runs_completed = runs_completed;
        verdict.reason = Some(reason.into());
        verdict
    }

    /// The probe's target does not exist.
    pub fn skipped(
        probe: impl Into<String>,
        category: ProbeCategory,
        runs_requested: u32,
        reason: impl Into<String>,
    ) -> Self {
        let mut verdict = Self::base(probe, category, VerdictStatus::Skip, runs_requested);
        verdict.reason = Some(reason.into());
        verdict
    }

    /// Tolerated failures were downgraded to `warnings`.
    pub fn warned(
        probe: impl Into<String>,
        category: ProbeCategory,
        runs: u32,
        warnings: Vec<String>,
        duration: Duration,
    ) -> Self {
        let mut verdict = Self::base(probe, category, VerdictStatus::Warn, runs);
        verdict.runs_completed = runs;
        verdict.warnings = warnings;
        verdict.duration = duration;
        verdict
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_divergence(mut self, divergence: Divergence) -> Self {
        self.divergence = Some(divergence);
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn is_failure(&self) -> bool {
        self.status == VerdictStatus::Fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_passed() {
        let verdict = Verdict::passed("p", ProbeCategory::Script, 3, Duration::from_millis(5));
        assert_eq!(verdict.status, VerdictStatus::Pass);
        assert_eq!(verdict.runs_completed, 3);
        assert!(verdict.reason.is_none());
    }

    #[test]
    fn test_verdict_failed() {
        let verdict = Verdict::failed("p", ProbeCategory::Script, 3, 2, "run 2 changed state")
            .with_output("appended\n");
        assert!(verdict.is_failure());
        assert_eq!(verdict.runs_completed, 2);
        assert_eq!(verdict.output.as_deref(), Some("appended\n"));
    }

    #[test]
    fn test_verdict_skipped_has_no_runs() {
        let verdict = Verdict::skipped("p", ProbeCategory::Document, 2, "not found");
        assert_eq!(verdict.status, VerdictStatus::Skip);
        assert_eq!(verdict.runs_completed, 0);
        assert!(!verdict.is_failure());
    }

    #[test]
    fn test_verdict_json_status_names() {
        let verdict = Verdict::warned(
            "make_lint",
            ProbeCategory::BuildTarget,
            2,
            vec!["run 1 failed".into()],
            Duration::ZERO,
        );
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["status"], "warn");
        assert_eq!(json["category"], "build_target");
    }
}
