//! YAML-described suites of probes and the runner that executes them.
//!
//! ```yaml
//! name: workstation-setup
//! settings:
//!   runs: 3
//! probes:
//!   - kind: script
//!     name: setup_env.sh
//!     path: scripts/config/setup_env.sh
//!     watch: [.env]
//!   - kind: make
//!     targets: [clean, format, lint, help, doctor]
//!     tolerate_failure: true
//!   - kind: document
//!     path: docs/idempotencia_automatizacion.md
//!   - kind: self_check
//! ```
//!
//! Relative paths resolve against the directory holding the suite file, and
//! scripts and commands run with that directory as their working directory.
//! A `document` entry without `sections` checks [`DEFAULT_REQUIRED_SECTIONS`].

use crate::builtin::builtin_probes;
use crate::docs::{check_document, DEFAULT_REQUIRED_SECTIONS};
use crate::error::{IdempotenceError, IdempotenceResult};
use crate::probe::{CommandAction, Probe};
use crate::report::SuiteReport;
use crate::types::{ProbeCategory, VerifierConfig};
use crate::verdict::Verdict;
use crate::verifier::Verifier;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};

/// Targets checked when a `make` entry lists none.
pub const DEFAULT_MAKE_TARGETS: [&str; 5] = ["clean", "format", "lint", "help", "doctor"];

/// Options shared by every process probe entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeOptions {
    pub description: String,
    /// Paths snapshotted after every run.
    pub watch: Vec<PathBuf>,
    /// Overrides `settings.runs` for this entry.
    pub runs: Option<u32>,
    /// Downgrade failing runs to warnings.
    pub tolerate_failure: bool,
    pub compare_output: Option<bool>,
}

/// One entry of a suite file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeSpec {
    Script {
        name: Option<String>,
        path: PathBuf,
        #[serde(flatten)]
        options: ProbeOptions,
    },
    Make {
        #[serde(default)]
        targets: Vec<String>,
        dir: Option<PathBuf>,
        #[serde(flatten)]
        options: ProbeOptions,
    },
    Command {
        name: String,
        program: String,
        #[serde(default)]
        args: Vec<String>,
        cwd: Option<PathBuf>,
        #[serde(flatten)]
        options: ProbeOptions,
    },
    Document {
        path: PathBuf,
        #[serde(default)]
        sections: Vec<String>,
    },
    SelfCheck,
}

/// A suite file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteConfig {
    #[serde(default = "default_suite_name")]
    pub name: String,
    #[serde(default)]
    pub settings: VerifierConfig,
    #[serde(default)]
    pub probes: Vec<ProbeSpec>,
    /// Directory relative paths resolve against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_suite_name() -> String {
    "idempotence".to_string()
}

impl SuiteConfig {
    pub fn new(name: impl Into<String>, probes: Vec<ProbeSpec>) -> Self {
        Self {
            name: name.into(),
            settings: VerifierConfig::default(),
            probes,
            base_dir: PathBuf::from("."),
        }
    }

    /// Load a suite file; relative paths resolve against its directory.
    pub fn load(path: &Path) -> IdempotenceResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut suite = Self::from_yaml(&text)?;
        suite.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(suite)
    }

    pub fn from_yaml(text: &str) -> IdempotenceResult<Self> {
        let mut suite: SuiteConfig = serde_yaml::from_str(text)?;
        suite.base_dir = PathBuf::from(".");
        Ok(suite)
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// A unit of work planned from a suite entry.
enum PlannedCheck {
    Probe { probe: Probe, runs: u32 },
    Document { path: PathBuf, sections: Vec<String> },
}

/// Runs every probe of a suite sequentially and collects a report.
pub struct SuiteRunner {
    verifier: Verifier,
}

impl SuiteRunner {
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            verifier: Verifier::new(config),
        }
    }

    pub fn config(&self) -> &VerifierConfig {
        self.verifier.config()
    }

    pub fn run(&self, suite: &SuiteConfig) -> IdempotenceResult<SuiteReport> {
        let start = Instant::now();
        let mut report = SuiteReport::new(suite.name.clone());

        // Self-check probes write here; dropped once the suite is done.
        let scratch = tempfile::tempdir()?;
        let planned = self.plan(suite, scratch.path())?;
        let total = planned.len();

        info!(suite = %suite.name, checks = total, "running idempotence suite");

        for (index, check) in planned.into_iter().enumerate() {
            let verdict = self.execute(check);
            let failed = verdict.is_failure();
            report.add_verdict(verdict);

            if failed && self.config().fail_fast {
                info!("fail-fast: stopping after first failure");
                report.duration = start.elapsed();
                report.finalize(total - index - 1);
                return Ok(report);
            }
        }

        report.duration = start.elapsed();
        report.finalize(0);

        info!(
            "Idempotence suite complete: {} passed, {} failed, {} warned, {} skipped",
            report.summary.passed,
            report.summary.failed,
            report.summary.warned,
            report.summary.skipped
        );

        Ok(report)
    }

    fn plan(&self, suite: &SuiteConfig, scratch: &Path) -> IdempotenceResult<Vec<PlannedCheck>> {
        let config = self.config();
        let mut planned = Vec::new();

        for spec in &suite.probes {
            match spec {
                ProbeSpec::Script {
                    name,
                    path,
                    options,
                } => {
                    // Absolute, since the script runs from the suite directory.
                    let resolved = std::path::absolute(suite.resolve(path))?;
                    let name = name.clone().unwrap_or_else(|| file_label(path));
                    let action = CommandAction::script(config.shell.as_str(), resolved)
                        .current_dir(&suite.base_dir);
                    let probe = Probe::new(name, ProbeCategory::Script, action);
                    planned.push(self.planned(suite, probe, options)?);
                }
                ProbeSpec::Make {
                    targets,
                    dir,
                    options,
                } => {
                    let dir = suite.resolve(dir.as_deref().unwrap_or(Path::new(".")));
                    let targets: Vec<String> = if targets.is_empty() {
                        DEFAULT_MAKE_TARGETS.iter().map(|t| t.to_string()).collect()
                    } else {
                        targets.clone()
                    };
                    for target in targets {
                        let probe =
                            Probe::make_target(target, Some(dir.clone()), &config.make_program);
                        planned.push(self.planned(suite, probe, options)?);
                    }
                }
                ProbeSpec::Command {
                    name,
                    program,
                    args,
                    cwd,
                    options,
                } => {
                    let cwd = cwd
                        .as_deref()
                        .map(|cwd| suite.resolve(cwd))
                        .unwrap_or_else(|| suite.base_dir.clone());
                    let action = CommandAction::new(program)
                        .args(args.iter().cloned())
                        .current_dir(cwd);
                    let probe = Probe::new(name, ProbeCategory::Command, action);
                    planned.push(self.planned(suite, probe, options)?);
                }
                ProbeSpec::Document { path, sections } => {
                    let sections = if sections.is_empty() {
                        DEFAULT_REQUIRED_SECTIONS.iter().map(|s| s.to_string()).collect()
                    } else {
                        sections.clone()
                    };
                    planned.push(PlannedCheck::Document {
                        path: suite.resolve(path),
                        sections,
                    });
                }
                ProbeSpec::SelfCheck => {
                    for probe in builtin_probes(scratch) {
                        planned.push(PlannedCheck::Probe {
                            probe,
                            runs: config.runs,
                        });
                    }
                }
            }
        }

        Ok(planned)
    }

    fn planned(
        &self,
        suite: &SuiteConfig,
        mut probe: Probe,
        options: &ProbeOptions,
    ) -> IdempotenceResult<PlannedCheck> {
        let runs = options.runs.unwrap_or(self.config().runs);
        if runs < 2 {
            return Err(IdempotenceError::InvalidConfiguration(format!(
                "probe `{}` needs at least 2 runs, got {}",
                probe.name, runs
            )));
        }

        if !options.description.is_empty() {
            probe = probe.with_description(&options.description);
        }
        for path in &options.watch {
            probe = probe.watch(suite.resolve(path));
        }
        if options.tolerate_failure {
            probe = probe.tolerate_failures();
        }
        if let Some(compare) = options.compare_output {
            probe = probe.compare_output(compare);
        }
        Ok(PlannedCheck::Probe { probe, runs })
    }

    /// Harness errors become failing verdicts so the rest of the suite still runs.
    fn execute(&self, check: PlannedCheck) -> Verdict {
        match check {
            PlannedCheck::Probe { mut probe, runs } => {
                match self.verifier.verify(&mut probe, runs) {
                    Ok(verdict) => verdict,
                    Err(e) => {
                        error!(probe = %probe.name, "harness error: {}", e);
                        Verdict::failed(
                            &probe.name,
                            probe.category,
                            runs,
                            0,
                            format!("harness error: {}", e),
                        )
                        .with_description(&probe.description)
                    }
                }
            }
            PlannedCheck::Document { path, sections } => {
                match check_document(&path, &sections) {
                    Ok(verdict) => verdict,
                    Err(e) => {
                        error!(path = %path.display(), "harness error: {}", e);
                        Verdict::failed(
                            format!("docs:{}", path.display()),
                            ProbeCategory::Document,
                            1,
                            0,
                            format!("harness error: {}", e),
                        )
                    }
                }
            }
        }
    }
}

impl Default for SuiteRunner {
    fn default() -> Self {
        Self::new(VerifierConfig::default())
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VerdictStatus;

    const SUITE: &str = r#"
name: workstation
settings:
  runs: 2
probes:
  - kind: script
    path: scripts/setup_env.sh
    watch: [.env]
  - kind: make
    dir: build
    tolerate_failure: true
  - kind: command
    name: always-true
    program: "true"
  - kind: document
    path: docs/idempotencia.md
    sections: [Idempotencia]
  - kind: self_check
"#;

    #[test]
    fn test_parse_suite() {
        let suite = SuiteConfig::from_yaml(SUITE).unwrap();
        assert_eq!(suite.name, "workstation");
        assert_eq!(suite.settings.runs, 2);
        assert_eq!(suite.settings.shell, "bash");
        assert_eq!(suite.probes.len(), 5);
        match &suite.probes[0] {
            ProbeSpec::Script { name, path, options } => {
                assert!(name.is_none());
                assert_eq!(path, Path::new("scripts/setup_env.sh"));
                assert_eq!(options.watch, vec![PathBuf::from(".env")]);
            }
            other => panic!("unexpected entry {:?}", other),
        }
        match &suite.probes[1] {
            ProbeSpec::Make { targets, options, .. } => {
                assert!(targets.is_empty());
                assert!(options.tolerate_failure);
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = SuiteConfig::from_yaml("probes:\n  - kind: ansible\n").unwrap_err();
        assert!(matches!(err, IdempotenceError::Yaml(_)));
    }

    #[test]
    fn test_missing_collaborators_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut suite = SuiteConfig::from_yaml(SUITE).unwrap();
        suite.base_dir = dir.path().to_path_buf();
        suite.probes.retain(|p| !matches!(p, ProbeSpec::Command { .. }));

        let runner = SuiteRunner::new(suite.settings.clone());
        let report = runner.run(&suite).unwrap();

        // 1 script + 5 default make targets + 1 document + 3 built-ins
        assert_eq!(report.summary.total, 10);
        assert_eq!(report.summary.skipped, 7);
        assert_eq!(report.summary.passed, 3);
        assert!(report.is_idempotent());
    }

    #[test]
    fn test_document_defaults_to_standard_sections() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("guide.md"),
            "# Idempotencia\n## Automatización\n## Makefile\n## Scripts\n",
        )
        .unwrap();
        let mut suite =
            SuiteConfig::from_yaml("probes:\n  - kind: document\n    path: guide.md\n").unwrap();
        suite.base_dir = dir.path().to_path_buf();

        let report = SuiteRunner::default().run(&suite).unwrap();
        assert_eq!(report.summary.failed, 1);
        assert_eq!(
            report.verdicts[0].reason.as_deref(),
            Some("missing sections: GitHub Actions, Pruebas")
        );
    }

    #[test]
    fn test_runs_below_two_rejected() {
        let suite = SuiteConfig::from_yaml(
            "probes:\n  - kind: script\n    path: a.sh\n    runs: 1\n",
        )
        .unwrap();
        let err = SuiteRunner::default().run(&suite).unwrap_err();
        assert!(matches!(err, IdempotenceError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_spawn_error_becomes_failed_verdict() {
        let suite = SuiteConfig::new(
            "broken",
            vec![ProbeSpec::Command {
                name: "ghost".into(),
                program: "idem-no-such-program-xyz".into(),
                args: Vec::new(),
                cwd: None,
                options: ProbeOptions::default(),
            }],
        );
        let report = SuiteRunner::default().run(&suite).unwrap();
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.verdicts[0].status, VerdictStatus::Fail);
        assert!(report.verdicts[0]
            .reason
            .as_deref()
            .unwrap()
            .starts_with("harness error"));
    }

    #[cfg(unix)]
    #[test]
    fn test_fail_fast_counts_not_run() {
        let failing = ProbeSpec::Command {
            name: "fails".into(),
            program: "false".into(),
            args: Vec::new(),
            cwd: None,
            options: ProbeOptions::default(),
        };
        let suite = SuiteConfig::new("ff", vec![failing, ProbeSpec::SelfCheck]);
        let runner = SuiteRunner::new(VerifierConfig {
            fail_fast: true,
            ..Default::default()
        });
        let report = runner.run(&suite).unwrap();
        assert_eq!(report.verdicts.len(), 1);
        assert_eq!(report.summary.not_run, 3);
        assert_eq!(report.summary.total, 4);
    }
}
