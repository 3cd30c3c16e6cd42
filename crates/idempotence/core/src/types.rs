//! Shared types for idempotence verification.

use serde::{Deserialize, Serialize};

/// Outcome classification of an idempotence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    /// Every run succeeded and nothing significant changed after run 1.
    Pass,
    /// A run failed or the observed state diverged.
    Fail,
    /// A tolerant probe had failing runs that were downgraded to warnings.
    Warn,
    /// The probe's target does not exist.
    Skip,
}

impl VerdictStatus {
    pub fn icon(&self) -> &'static str {
        match self {
            VerdictStatus::Pass => "✓",
            VerdictStatus::Fail => "✗",
            VerdictStatus::Warn => "⚠",
            VerdictStatus::Skip => "○",
        }
    }
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerdictStatus::Pass => write!(f, "PASS"),
            VerdictStatus::Fail => write!(f, "FAIL"),
            VerdictStatus::Warn => write!(f, "WARN"),
            VerdictStatus::Skip => write!(f, "SKIP"),
        }
    }
}

/// How a probe treats a run that exits unsuccessfully.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tolerance {
    /// A failing run is a failure of the probe.
    #[default]
    Strict,
    /// A failing run is logged as a warning and the loop continues.
    ///
    /// Only exit-status failures are downgraded; state divergence still fails.
    WarnOnFailure,
}

/// Grouping used in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeCategory {
    Script,
    BuildTarget,
    Command,
    FileSystem,
    State,
    Document,
}

impl std::fmt::Display for ProbeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeCategory::Script => write!(f, "Script"),
            ProbeCategory::BuildTarget => write!(f, "Build Target"),
            ProbeCategory::Command => write!(f, "Command"),
            ProbeCategory::FileSystem => write!(f, "File System"),
            ProbeCategory::State => write!(f, "State"),
            ProbeCategory::Document => write!(f, "Document"),
        }
    }
}

/// Configuration for the verifier and suite runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Number of sequential runs per probe (at least 2).
    pub runs: u32,

    /// Interpreter used for script probes.
    pub shell: String,

    /// Build tool used for build-target probes.
    pub make_program: String,

    /// Treat combined output as significant for process probes.
    pub compare_output: bool,

    /// Stop a suite at the first failing verdict.
    pub fail_fast: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            runs: 3,
            shell: "bash".to_string(),
            make_program: "make".to_string(),
            compare_output: false,
            fail_fast: false,
        }
    }
}
