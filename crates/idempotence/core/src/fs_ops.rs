//! Idempotent file-system primitives.

use crate::error::IdempotenceResult;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Create `path` and any missing parents. A no-op when it already is a directory.
///
/// Fails if `path` exists but is not a directory.
pub fn ensure_dir(path: &Path) -> IdempotenceResult<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Write `content` to `path` only if nothing exists there yet.
///
/// Returns `true` when the file was created, `false` when it already existed
/// (its bytes are left untouched even if `content` differs).
pub fn write_if_absent(path: &Path, content: &[u8]) -> IdempotenceResult<bool> {
    create_with(path, |file| {
        file.write_all(content)?;
        file.sync_all()
    })
}

/// Create `path` exclusively and fill it. A file that could not be filled
/// completely is removed so a later attempt starts from scratch.
fn create_with<F>(path: &Path, fill: F) -> IdempotenceResult<bool>
where
    F: FnOnce(&mut File) -> std::io::Result<()>,
{
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            debug!(path = %path.display(), "file exists, leaving it untouched");
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };

    if let Err(e) = fill(&mut file) {
        drop(file);
        if let Err(cleanup) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %cleanup, "could not remove partial file");
        }
        return Err(e.into());
    }
    Ok(true)
}
