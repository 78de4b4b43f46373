//! Splitting PR records into atomic diffs.
//!
//! A raw PR record carries a `diff_url`; the splitter resolves it to diff
//! text through a [`DiffSource`], parses the diff, groups files by top-level
//! directory, and emits either one combined diff per directory or per-file
//! diffs when the group is too large. Per-record failures skip the record —
//! the stream never aborts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::config::SplitConfig;
use crate::core::errors::{MaiError, Result};
use crate::split::diff::{FileDiff, count_loc, group_by_directory, parse_diff};

/// Raw PR record as found in an NDJSON dump. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPrRecord {
    /// PR identifier as exported by the warehouse (string or number).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_id: Option<Value>,
    /// Repository `owner/name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<Value>,
    /// URL of the PR's unified diff.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_url: Option<String>,
}

impl RawPrRecord {
    /// Loggable identifier for this record.
    #[must_use]
    pub fn id_label(&self) -> String {
        self.pr_id
            .as_ref()
            .map_or_else(|| "<no pr_id>".to_string(), Value::to_string)
    }
}

/// A (title, patch) fragment scoped to one directory or one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicDiff {
    pub title: String,
    pub patch: String,
}

/// Output record: a PR split into atomic diffs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitRecord {
    #[serde(default)]
    pub pr_id: Option<Value>,
    #[serde(default)]
    pub repo: Option<Value>,
    pub original_diff: String,
    pub atomic_diffs: Vec<AtomicDiff>,
}

/// Why a record was dropped from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Record carries no `diff_url`.
    MissingDiffUrl,
    /// The diff URL 404s (repo deleted or made private).
    Vanished,
    /// Fetch failed for any other reason.
    FetchFailed(String),
    /// Splitting produced fewer atomic diffs than `min_diffs`.
    TooFewDiffs { produced: usize, min: usize },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDiffUrl => f.write_str("no diff_url"),
            Self::Vanished => f.write_str("diff vanished (repo deleted/private)"),
            Self::FetchFailed(details) => write!(f, "fetch failed: {details}"),
            Self::TooFewDiffs { produced, min } => {
                write!(f, "too few diffs ({produced} < {min})")
            }
        }
    }
}

/// Outcome of splitting one record.
#[derive(Debug, Clone)]
pub enum SplitOutcome {
    /// Record was split; write it out.
    Split(SplitRecord),
    /// Record was dropped; no output line.
    Skipped(SkipReason),
}

/// Source of diff text for a `diff_url`.
///
/// The seam between the pure splitting logic and the cache/network layers:
/// tests and offline runs supply cache-backed sources, the `fetch` feature
/// supplies a downloading one.
pub trait DiffSource {
    /// Resolve `url` to unified diff text.
    fn diff_text(&mut self, url: &str) -> Result<String>;
}

impl DiffSource for Box<dyn DiffSource> {
    fn diff_text(&mut self, url: &str) -> Result<String> {
        (**self).diff_text(url)
    }
}

/// Splitter over a diff source.
pub struct Splitter<S: DiffSource> {
    config: SplitConfig,
    source: S,
}

impl<S: DiffSource> Splitter<S> {
    pub fn new(config: SplitConfig, source: S) -> Self {
        Self { config, source }
    }

    /// Split one record. Infallible at the record level: every failure mode
    /// folds into `SplitOutcome::Skipped`.
    pub fn split_record(&mut self, record: &RawPrRecord) -> SplitOutcome {
        let Some(diff_url) = record.diff_url.as_deref() else {
            return SplitOutcome::Skipped(SkipReason::MissingDiffUrl);
        };

        let diff_text = match self.source.diff_text(diff_url) {
            Ok(text) => text,
            Err(MaiError::DiffVanished { .. }) => {
                return SplitOutcome::Skipped(SkipReason::Vanished);
            }
            Err(err) => {
                return SplitOutcome::Skipped(SkipReason::FetchFailed(err.to_string()));
            }
        };

        let atomic_diffs = build_atomic_diffs(parse_diff(&diff_text), &self.config);

        if atomic_diffs.len() < self.config.min_diffs {
            return SplitOutcome::Skipped(SkipReason::TooFewDiffs {
                produced: atomic_diffs.len(),
                min: self.config.min_diffs,
            });
        }

        SplitOutcome::Split(SplitRecord {
            pr_id: record.pr_id.clone(),
            repo: record.repo.clone(),
            original_diff: diff_text,
            atomic_diffs,
        })
    }
}

/// Turn grouped file diffs into atomic diffs.
///
/// A group whose added-line total exceeds `max_loc` is exploded into per-file
/// diffs; so is every group once the PR touches at least `max_dirs` top-level
/// directories. Otherwise the group collapses into one combined diff titled
/// after the directory.
#[must_use]
pub fn build_atomic_diffs(files: Vec<FileDiff>, config: &SplitConfig) -> Vec<AtomicDiff> {
    let groups = group_by_directory(files);
    let group_count = groups.len();
    let mut atomic_diffs = Vec::new();

    for (dir_name, dir_files) in groups {
        let total_loc: usize = dir_files.iter().map(|f| count_loc(&f.patch)).sum();

        if total_loc > config.max_loc || group_count >= config.max_dirs {
            for file in dir_files {
                atomic_diffs.push(AtomicDiff {
                    title: format!("Update {}", file.path),
                    patch: file.patch,
                });
            }
        } else {
            let combined = dir_files
                .iter()
                .map(|f| f.patch.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            atomic_diffs.push(AtomicDiff {
                title: format!("Update {dir_name} directory"),
                patch: combined,
            });
        }
    }

    atomic_diffs
}
