//! Observations captured from a single probe execution.
//!
//! File contents are recorded as a BLAKE3 digest plus length so that large
//! trees can be compared without keeping every byte around between runs.

use crate::error::{IdempotenceError, IdempotenceResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// Exit status of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitInfo {
    /// Process exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub success: bool,
}

impl ExitInfo {
    /// Exit info for an in-process action that completed.
    pub fn ok() -> Self {
        Self {
            code: Some(0),
            success: true,
        }
    }

    pub fn from_status(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
            success: status.success(),
        }
    }
}

impl std::fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// One entry below a watched directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeEntry {
    File { len: u64, digest: String },
    Directory,
    Symlink { target: PathBuf },
    Other,
}

/// Existence, type and content of a watched path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PathSnapshot {
    Missing,
    File {
        len: u64,
        digest: String,
    },
    Symlink {
        target: PathBuf,
    },
    /// Every entry below the directory, keyed by relative path.
    Directory {
        entries: BTreeMap<String, TreeEntry>,
    },
    Other,
}

impl PathSnapshot {
    /// Capture the current state of `path` without following a top-level symlink.
    pub fn capture(path: &Path) -> IdempotenceResult<Self> {
        let metadata = match std::fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(PathSnapshot::Missing),
            Err(source) => {
                return Err(IdempotenceError::Snapshot {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let file_type = metadata.file_type();
        if file_type.is_symlink() {
            let target = read_link(path)?;
            Ok(PathSnapshot::Symlink { target })
        } else if file_type.is_file() {
            let (len, digest) = digest_file(path)?;
            Ok(PathSnapshot::File { len, digest })
        } else if file_type.is_dir() {
            Ok(PathSnapshot::Directory {
                entries: snapshot_tree(path)?,
            })
        } else {
            Ok(PathSnapshot::Other)
        }
    }

    /// Short human-readable description used in divergence messages.
    pub fn describe(&self) -> String {
        match self {
            PathSnapshot::Missing => "missing".to_string(),
            PathSnapshot::File { len, digest } => {
                format!("file ({} bytes, blake3 {})", len, short_digest(digest))
            }
            PathSnapshot::Symlink { target } => format!("symlink -> {}", target.display()),
            PathSnapshot::Directory { entries } => {
                format!("directory ({} entries)", entries.len())
            }
            PathSnapshot::Other => "special file".to_string(),
        }
    }
}

fn short_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}

fn read_link(path: &Path) -> IdempotenceResult<PathBuf> {
    std::fs::read_link(path).map_err(|source| IdempotenceError::Snapshot {
        path: path.to_path_buf(),
        source,
    })
}

fn digest_file(path: &Path) -> IdempotenceResult<(u64, String)> {
    let snapshot_err = |source| IdempotenceError::Snapshot {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(snapshot_err)?;
    let mut hasher = blake3::Hasher::new();
    let len = std::io::copy(&mut file, &mut hasher).map_err(snapshot_err)?;
    Ok((len, hasher.finalize().to_hex().to_string()))
}

fn snapshot_tree(root: &Path) -> IdempotenceResult<BTreeMap<String, TreeEntry>> {
    let mut entries = BTreeMap::new();

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|source| IdempotenceError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .into_owned();

        let file_type = entry.file_type();
        let tree_entry = if file_type.is_symlink() {
            TreeEntry::Symlink {
                target: read_link(entry.path())?,
            }
        } else if file_type.is_file() {
            let (len, digest) = digest_file(entry.path())?;
            TreeEntry::File { len, digest }
        } else if file_type.is_dir() {
            TreeEntry::Directory
        } else {
            TreeEntry::Other
        };
        entries.insert(relative, tree_entry);
    }

    Ok(entries)
}

/// The first significant difference between a run and the baseline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divergence {
    /// Run (1-based) that diverged from run 1.
    pub run: u32,
    /// Field that changed, e.g. `exit`, `output`, `state` or `path:<p>`.
    pub field: String,
    pub expected: String,
    pub actual: String,
}

impl std::fmt::Display for Divergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "run {} changed {}: expected {}, got {}",
            self.run, self.field, self.expected, self.actual
        )
    }
}

/// Captured result of one execution of a probe.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// 1-based run index.
    pub run: u32,
    pub exit: ExitInfo,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Snapshots of every watched path, taken after the run.
    pub snapshots: BTreeMap<PathBuf, PathSnapshot>,
    /// Read-back state of a function probe.
    pub state: Option<serde_json::Value>,
    pub duration: Duration,
}

impl Observation {
    pub fn new(run: u32, exit: ExitInfo) -> Self {
        Self {
            run,
            exit,
            stdout: Vec::new(),
            stderr: Vec::new(),
            snapshots: BTreeMap::new(),
            state: None,
            duration: Duration::ZERO,
        }
    }

    /// Stdout followed by stderr.
    pub fn combined_output(&self) -> Vec<u8> {
        let mut combined = Vec::with_capacity(self.stdout.len() + self.stderr.len());
        combined.extend_from_slice(&self.stdout);
        combined.extend_from_slice(&self.stderr);
        combined
    }

    pub fn output_lossy(&self) -> String {
        String::from_utf8_lossy(&self.combined_output()).into_owned()
    }

    /// Snapshot every path in `paths` into this observation.
    pub fn capture_paths(&mut self, paths: &[PathBuf]) -> IdempotenceResult<()> {
        for path in paths {
            self.snapshots
                .insert(path.clone(), PathSnapshot::capture(path)?);
        }
        Ok(())
    }

    /// Compare against the baseline observation.
    ///
    /// Exit status is always significant. Snapshots and state are compared
    /// when present; combined output only when `compare_output` is set.
    pub fn diff(&self, baseline: &Observation, compare_output: bool) -> Option<Divergence> {
        if self.exit.success != baseline.exit.success || self.exit.code != baseline.exit.code {
            return Some(self.divergence("exit", baseline.exit.to_string(), self.exit.to_string()));
        }

        if let Some(divergence) = self.diff_effects(baseline) {
            return Some(divergence);
        }

        if compare_output && self.combined_output() != baseline.combined_output() {
            return Some(self.divergence(
                "output",
                format!("{} bytes", baseline.stdout.len() + baseline.stderr.len()),
                format!("{} bytes", self.stdout.len() + self.stderr.len()),
            ));
        }

        None
    }

    /// Compare only watched paths and state, ignoring exit status and output.
    pub fn diff_effects(&self, baseline: &Observation) -> Option<Divergence> {
        for (path, expected) in &baseline.snapshots {
            let actual = self
                .snapshots
                .get(path)
                .cloned()
                .unwrap_or(PathSnapshot::Missing);
            if &actual != expected {
                let (field, before, after) = locate_path_change(path, expected, &actual);
                return Some(self.divergence(field, before, after));
            }
        }

        if self.state != baseline.state {
            return Some(self.divergence(
                "state",
                render_state(&baseline.state),
                render_state(&self.state),
            ));
        }

        None
    }

    fn divergence(&self, field: impl Into<String>, expected: String, actual: String) -> Divergence {
        Divergence {
            run: self.run,
            field: field.into(),
            expected,
            actual,
        }
    }
}

fn render_state(state: &Option<serde_json::Value>) -> String {
    match state {
        Some(value) => value.to_string(),
        None => "no state".to_string(),
    }
}

/// Narrow a path change down to the first differing entry inside a directory.
fn locate_path_change(
    path: &Path,
    before: &PathSnapshot,
    after: &PathSnapshot,
) -> (String, String, String) {
    if let (
        PathSnapshot::Directory { entries: old },
        PathSnapshot::Directory { entries: new },
    ) = (before, after)
    {
        let changed = old
            .keys()
            .chain(new.keys())
            .find(|key| old.get(*key) != new.get(*key));
        if let Some(key) = changed {
            return (
                format!("path:{}", path.join(key).display()),
                describe_entry(old.get(key)),
                describe_entry(new.get(key)),
            );
        }
    }

    (
        format!("path:{}", path.display()),
        before.describe(),
        after.describe(),
    )
}

fn describe_entry(entry: Option<&TreeEntry>) -> String {
    match entry {
        None => "missing".to_string(),
        Some(TreeEntry::File { len, digest }) => {
            format!("file ({} bytes, blake3 {})", len, short_digest(digest))
        }
        Some(TreeEntry::Directory) => "directory".to_string(),
        Some(TreeEntry::Symlink { target }) => format!("symlink -> {}", target.display()),
        Some(TreeEntry::Other) => "special file".to_string(),
    }
}
