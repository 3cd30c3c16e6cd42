//! Error types for idempotence verification.
//!
//! These are harness errors: the verifier could not do its job. A probe that
//! runs but misbehaves is reported through a [`Verdict`](crate::Verdict), not
//! through this type.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while setting up or driving a probe.
#[derive(Debug, Error)]
pub enum IdempotenceError {
    /// Configuration error (e.g. fewer than two runs requested).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The probe's program could not be started at all.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading a watched path failed for a reason other than absence.
    #[error("failed to snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Walking a watched directory tree failed.
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// A function probe reported an error of its own.
    #[error("probe `{probe}` failed: {reason}")]
    Action { probe: String, reason: String },

    /// Generic I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// State serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Suite file parsing error.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Convenience result type for verifier operations.
pub type IdempotenceResult<T> = Result<T, IdempotenceError>;
