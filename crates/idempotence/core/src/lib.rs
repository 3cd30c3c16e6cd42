//! MAPLE Idempotence Verifier
//!
//! Checks that re-running an action after its first successful run produces
//! no further observable change. An action is wrapped in a [`Probe`], executed
//! `runs` times in program order, and every [`Observation`] after the first is
//! compared against the first one.
//!
//! # Probe kinds
//!
//! - **Scripts**: a shell interpreter running a script path
//! - **Build targets**: `make <target>` in a project directory
//! - **Commands**: any command line, optionally watching paths it touches
//! - **Functions**: in-process closures whose read-back state is compared
//!
//! # Verdicts
//!
//! - `Pass`: every run succeeded and nothing significant changed after run 1
//! - `Fail`: a run failed or the observed state diverged
//! - `Warn`: a probe that explicitly tolerates failures had failing runs
//! - `Skip`: the probe's target (script, Makefile, document) does not exist
//!
//! # Example
//!
//! ```rust,no_run
//! use idempotence::{Probe, VerdictStatus, Verifier, VerifierConfig};
//!
//! let verifier = Verifier::new(VerifierConfig::default());
//! let mut probe = Probe::script("setup_env.sh", "scripts/config/setup_env.sh", "bash")
//!     .watch(".env");
//! let verdict = verifier.verify(&mut probe, 3).unwrap();
//! assert_eq!(verdict.status, VerdictStatus::Pass);
//! ```

pub mod builtin;
pub mod docs;
pub mod error;
pub mod fs_ops;
pub mod observation;
pub mod probe;
pub mod report;
pub mod state;
pub mod suite;
pub mod types;
pub mod verdict;
pub mod verifier;

pub use builtin::builtin_probes;
pub use docs::{
    check_document, contains_section, locate_section, missing_sections, SectionMatch,
    DEFAULT_REQUIRED_SECTIONS,
};
pub use error::{IdempotenceError, IdempotenceResult};
pub use fs_ops::{ensure_dir, write_if_absent};
pub use observation::{Divergence, ExitInfo, Observation, PathSnapshot};
pub use probe::{CommandAction, FnAction, Probe, ProbeAction};
pub use report::{ReportSummary, SuiteReport};
pub use state::{apply_idempotent, ConfigRecord};
pub use suite::{ProbeOptions, ProbeSpec, SuiteConfig, SuiteRunner, DEFAULT_MAKE_TARGETS};
pub use types::{ProbeCategory, Tolerance, VerdictStatus, VerifierConfig};
pub use verdict::Verdict;
pub use verifier::{verify, Verifier};
