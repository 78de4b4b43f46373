//! Unified-diff parsing primitives for the PR splitter.

use std::path::Path;

/// One file's worth of a unified diff, header line included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Path on the ` b/` side of the `diff --git` header.
    pub path: String,
    /// The file's patch text, starting with its header line.
    pub patch: String,
}

/// Split a unified diff into per-file patches.
///
/// Splits on `diff --git` headers; anything before the first header is
/// discarded. Tolerant of malformed input — an unparseable diff simply
/// yields fewer (or zero) files.
#[must_use]
pub fn parse_diff(diff_text: &str) -> Vec<FileDiff> {
    let mut files = Vec::new();
    let mut current_path: Option<String> = None;
    let mut current_patch: Vec<&str> = Vec::new();

    for line in diff_text.lines() {
        if line.starts_with("diff --git") {
            if let Some(path) = current_path.take()
                && !current_patch.is_empty()
            {
                files.push(FileDiff {
                    path,
                    patch: current_patch.join("\n"),
                });
            }
            // The path is whatever follows the last " b/" marker; a header
            // without one keeps the whole line, matching lenient parsers.
            let path = line.rsplit(" b/").next().unwrap_or(line).to_string();
            current_path = Some(path);
            current_patch = vec![line];
        } else if current_path.is_some() {
            current_patch.push(line);
        }
    }

    if let Some(path) = current_path
        && !current_patch.is_empty()
    {
        files.push(FileDiff {
            path,
            patch: current_patch.join("\n"),
        });
    }

    files
}

/// Count added lines in a patch: `+` prefixed, excluding `+++` headers.
#[must_use]
pub fn count_loc(patch: &str) -> usize {
    patch
        .lines()
        .filter(|line| line.starts_with('+') && !line.starts_with("+++"))
        .count()
}

/// Group file diffs by their top-level directory, preserving first-seen
/// order.
///
/// Files whose path has a single component carry no top-level directory and
/// join no group.
#[must_use]
pub fn group_by_directory(files: Vec<FileDiff>) -> Vec<(String, Vec<FileDiff>)> {
    let mut groups: Vec<(String, Vec<FileDiff>)> = Vec::new();

    for file in files {
        let path = Path::new(&file.path);
        let mut components = path.components();
        let Some(top) = components.next() else {
            continue;
        };
        // Single-component paths (repo-root files) have no directory.
        if components.next().is_none() {
            continue;
        }
        let top = top.as_os_str().to_string_lossy().to_string();

        match groups.iter_mut().find(|(name, _)| *name == top) {
            Some((_, members)) => members.push(file),
            None => groups.push((top, vec![file])),
        }
    }

    groups
}
