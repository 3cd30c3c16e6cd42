//! Required-section checks for Markdown documentation.
//!
//! Matching is case-sensitive and exact. A section counts as present when it
//! starts a heading at any level or appears anywhere as plain text.

use crate::error::IdempotenceResult;
use crate::types::ProbeCategory;
use crate::verdict::Verdict;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, warn};

/// Sections an idempotence/automation guide is expected to cover.
pub const DEFAULT_REQUIRED_SECTIONS: [&str; 6] = [
    "Idempotencia",
    "Automatización",
    "Makefile",
    "Scripts",
    "GitHub Actions",
    "Pruebas",
];

/// Deepest Markdown heading level.
const MAX_HEADING_LEVEL: usize = 6;

/// Where a required section was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SectionMatch {
    /// A heading of `level` on 1-based `line` starts with the section text.
    Heading { level: usize, line: usize },
    /// No heading, but the text occurs somewhere in the document.
    PlainText,
}

/// Find `section` in `content`, preferring a heading over a plain mention.
pub fn locate_section(content: &str, section: &str) -> Option<SectionMatch> {
    if content.is_empty() {
        return None;
    }

    for (index, line) in content.lines().enumerate() {
        if let Some((level, title)) = parse_heading(line) {
            if title.starts_with(section) {
                return Some(SectionMatch::Heading {
                    level,
                    line: index + 1,
                });
            }
        }
    }

    content.contains(section).then_some(SectionMatch::PlainText)
}

pub fn contains_section(content: &str, section: &str) -> bool {
    locate_section(content, section).is_some()
}

/// Sections from `required` that `content` does not contain, in input order.
pub fn missing_sections<'a, S: AsRef<str>>(content: &str, required: &'a [S]) -> Vec<&'a str> {
    required
        .iter()
        .map(AsRef::as_ref)
        .filter(|section| !contains_section(content, section))
        .collect()
}

fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > MAX_HEADING_LEVEL {
        return None;
    }
    let rest = &trimmed[level..];
    rest.strip_prefix(' ')
        .or_else(|| rest.strip_prefix('\t'))
        .map(|title| (level, title.trim_start()))
}

/// Check that the document at `path` contains every required section.
///
/// A missing document is a skip, not a failure.
pub fn check_document<S: AsRef<str>>(path: &Path, required: &[S]) -> IdempotenceResult<Verdict> {
    let name = format!("docs:{}", path.display());
    let start = Instant::now();

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "document not found, skipping");
            let reason = format!("document not found: {}", path.display());
            return Ok(Verdict::skipped(name, ProbeCategory::Document, 1, reason));
        }
        Err(e) => return Err(e.into()),
    };

    for section in required {
        debug!(
            section = section.as_ref(),
            found = ?locate_section(&content, section.as_ref()),
            "section lookup"
        );
    }

    let missing = missing_sections(&content, required);
    let verdict = if missing.is_empty() {
        Verdict::passed(name, ProbeCategory::Document, 1, start.elapsed())
    } else {
        Verdict::failed(
            name,
            ProbeCategory::Document,
            1,
            1,
            format!("missing sections: {}", missing.join(", ")),
        )
        .with_duration(start.elapsed())
    };
    Ok(verdict.with_description(format!("{} required sections", required.len())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VerdictStatus;

    const DOC: &str = "# Idempotencia\n\nIntro text mentioning GitHub Actions.\n\n## Automatización\n\n### Makefile\n";

    #[test]
    fn test_heading_any_level() {
        assert_eq!(
            locate_section(DOC, "Automatización"),
            Some(SectionMatch::Heading { level: 2, line: 5 })
        );
        assert_eq!(
            locate_section(DOC, "Makefile"),
            Some(SectionMatch::Heading { level: 3, line: 7 })
        );
        assert!(contains_section("###### Pruebas", "Pruebas"));
    }

    #[test]
    fn test_plain_text_match() {
        assert_eq!(
            locate_section(DOC, "GitHub Actions"),
            Some(SectionMatch::PlainText)
        );
    }

    #[test]
    fn test_case_sensitive() {
        assert!(!contains_section(DOC, "automatización"));
    }

    #[test]
    fn test_empty_document() {
        assert!(!contains_section("", "Scripts"));
    }

    #[test]
    fn test_not_a_heading() {
        assert_eq!(parse_heading("#hashtag"), None);
        assert_eq!(parse_heading("####### too deep"), None);
        assert_eq!(parse_heading("  ## Scripts"), Some((2, "Scripts")));
    }

    #[test]
    fn test_missing_sections_order() {
        let required = ["Idempotencia", "Scripts", "Pruebas"];
        assert_eq!(missing_sections(DOC, &required), vec!["Scripts", "Pruebas"]);
    }

    #[test]
    fn test_check_document_missing_is_skip() {
        let dir = tempfile::tempdir().unwrap();
        let verdict = check_document(&dir.path().join("nope.md"), &["Scripts"]).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Skip);
    }

    #[test]
    fn test_check_document_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idempotencia_automatizacion.md");
        std::fs::write(&path, DOC).unwrap();

        let ok = check_document(&path, &["Idempotencia", "Automatización"]).unwrap();
        assert_eq!(ok.status, VerdictStatus::Pass);

        let bad = check_document(&path, &["Scripts"]).unwrap();
        assert_eq!(bad.status, VerdictStatus::Fail);
        assert_eq!(bad.reason.as_deref(), Some("missing sections: Scripts"));
    }
}
