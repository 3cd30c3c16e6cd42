//! Built-in self-check probes.
//!
//! These exercise the in-process primitives ([`ensure_dir`], [`write_if_absent`],
//! [`ConfigRecord::apply`]) through the verifier, rooted in a caller-provided
//! scratch directory.

use crate::fs_ops::{ensure_dir, write_if_absent};
use crate::probe::Probe;
use crate::state::ConfigRecord;
use crate::types::ProbeCategory;
use std::path::{Path, PathBuf};

/// Directory, file and configuration probes rooted at `root`.
pub fn builtin_probes(root: &Path) -> Vec<Probe> {
    vec![
        directory_creation(root.join("idempotence_test")),
        file_creation(root.join("test_config.json")),
        configuration_apply(),
    ]
}

pub fn directory_creation(dir: PathBuf) -> Probe {
    Probe::function("directory_creation", dir.clone(), |dir: &mut PathBuf| {
        ensure_dir(dir)
    })
    .with_category(ProbeCategory::FileSystem)
    .with_description("create-directory-if-absent")
    .watch(dir)
}

/// Each attempt proposes different bytes; only the first may land.
pub fn file_creation(path: PathBuf) -> Probe {
    let mut attempt = 0u32;
    Probe::function("file_creation", path.clone(), move |path: &mut PathBuf| {
        attempt += 1;
        let content = format!("{{\"test\": true, \"attempt\": {}}}", attempt);
        write_if_absent(path, content.as_bytes()).map(|_| ())
    })
    .with_category(ProbeCategory::FileSystem)
    .with_description("create-file-if-absent")
    .watch(path)
}

pub fn configuration_apply() -> Probe {
    Probe::function(
        "configuration_apply",
        ConfigRecord::new("initial".to_string()),
        |config: &mut ConfigRecord| {
            config.apply("configured".to_string());
            Ok(())
        },
    )
    .with_description("apply the same configuration value repeatedly")
}
