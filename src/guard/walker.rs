//! Synchronous directory walker for the size guard.
//!
//! The walker is the "eyes" of the guard: it enumerates every regular file
//! under a root, skipping version-control metadata directories, excluded
//! paths, and ignored suffixes. Entries that cannot be read are recorded as
//! warnings instead of aborting — a CI gate prefers partial success over
//! total failure.
//!
//! Deliberately single-threaded: the scan is a once-per-invocation gate over
//! a working tree, and a plain stack loop finishes well before any thread
//! pool would pay for itself.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::core::config::GuardConfig;
use crate::core::errors::{MaiError, Result};
use crate::core::paths::resolve_absolute_path;

/// Walker configuration derived from `GuardConfig` plus a scan root.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    pub root: PathBuf,
    pub max_depth: usize,
    pub follow_symlinks: bool,
    pub excluded_dirs: HashSet<OsString>,
    pub excluded_paths: HashSet<PathBuf>,
    pub excluded_patterns: Vec<Regex>,
    pub ignored_suffixes: Vec<String>,
}

impl WalkerConfig {
    /// Build a walker config for `root`, compiling exclusion patterns.
    pub fn from_guard(root: &Path, guard: &GuardConfig) -> Result<Self> {
        let mut excluded_patterns = Vec::with_capacity(guard.excluded_patterns.len());
        for pattern in &guard.excluded_patterns {
            let compiled = Regex::new(pattern).map_err(|e| MaiError::InvalidConfig {
                details: format!("guard.excluded_patterns entry {pattern:?} is invalid: {e}"),
            })?;
            excluded_patterns.push(compiled);
        }

        Ok(Self {
            root: resolve_absolute_path(root),
            max_depth: guard.max_depth,
            follow_symlinks: guard.follow_symlinks,
            excluded_dirs: guard
                .excluded_dirs
                .iter()
                .map(|name| OsString::from(name.as_str()))
                .collect(),
            excluded_paths: guard.excluded_paths.iter().cloned().collect(),
            excluded_patterns,
            ignored_suffixes: guard.ignored_suffixes.clone(),
        })
    }

    fn is_ignored_name(&self, name: &str) -> bool {
        self.ignored_suffixes
            .iter()
            .any(|suffix| name.ends_with(suffix.as_str()))
    }

    fn matches_excluded_pattern(&self, rel_path: &Path) -> bool {
        if self.excluded_patterns.is_empty() {
            return false;
        }
        let rel = rel_path.to_string_lossy();
        self.excluded_patterns.iter().any(|re| re.is_match(&rel))
    }
}

/// A regular file discovered during the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path relative to the scan root.
    pub rel_path: PathBuf,
    pub size_bytes: u64,
}

/// A filesystem entry the walker could not read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: String,
}

impl SkippedEntry {
    fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Everything a single walk produced.
#[derive(Debug, Clone, Default)]
pub struct WalkData {
    pub files: Vec<FileRecord>,
    pub skipped: Vec<SkippedEntry>,
}

/// Walk the tree under `config.root` once, depth-first.
///
/// Never fails: an unreadable root simply yields an empty file list with a
/// skip record, matching the gate's always-answer contract.
pub fn walk(config: &WalkerConfig) -> WalkData {
    let mut data = WalkData::default();
    let mut stack: Vec<(PathBuf, usize)> = vec![(config.root.clone(), 0)];

    while let Some((dir, depth)) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                data.skipped
                    .push(SkippedEntry::new(&dir, format!("read_dir failed: {err}")));
                continue;
            }
        };

        for entry_result in entries {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(err) => {
                    data.skipped
                        .push(SkippedEntry::new(&dir, format!("unreadable entry: {err}")));
                    continue;
                }
            };

            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                data.skipped
                    .push(SkippedEntry::new(&path, "file type unavailable"));
                continue;
            };

            // Symlinks are never traversed into unless explicitly enabled.
            if !config.follow_symlinks && file_type.is_symlink() {
                continue;
            }

            let is_dir = if config.follow_symlinks && file_type.is_symlink() {
                match fs::metadata(&path) {
                    Ok(meta) => meta.is_dir(),
                    Err(err) => {
                        data.skipped
                            .push(SkippedEntry::new(&path, format!("stat failed: {err}")));
                        continue;
                    }
                }
            } else {
                file_type.is_dir()
            };

            let rel_path = path
                .strip_prefix(&config.root)
                .map_or_else(|_| path.clone(), Path::to_path_buf);

            if is_dir {
                if depth >= config.max_depth {
                    continue;
                }
                if let Some(name) = path.file_name()
                    && config.excluded_dirs.contains(name)
                {
                    continue;
                }
                if config.excluded_paths.contains(&path)
                    || config.matches_excluded_pattern(&rel_path)
                {
                    continue;
                }
                stack.push((path, depth + 1));
                continue;
            }

            let name = entry.file_name();
            if config.is_ignored_name(&name.to_string_lossy()) {
                continue;
            }
            if config.excluded_paths.contains(&path) || config.matches_excluded_pattern(&rel_path) {
                continue;
            }

            let meta = if config.follow_symlinks {
                fs::metadata(&path)
            } else {
                entry.metadata()
            };
            match meta {
                Ok(meta) if meta.is_file() => {
                    data.files.push(FileRecord {
                        rel_path,
                        size_bytes: meta.len(),
                    });
                }
                // Sockets, FIFOs and other non-regular entries do not count.
                Ok(_) => {}
                Err(err) => {
                    data.skipped
                        .push(SkippedEntry::new(&path, format!("stat failed: {err}")));
                }
            }
        }
    }

    data
}
