//! Scan reports and the repository size gate built on top of the walker.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::core::config::{DEFAULT_MAX_FILE_SIZE_BYTES, GuardConfig};
use crate::core::errors::Result;
use crate::guard::walker::{self, SkippedEntry, WalkerConfig};

/// A file whose byte size exceeds the configured maximum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OversizedFile {
    /// Path relative to the scan root.
    pub rel_path: PathBuf,
    /// Observed size in bytes.
    pub size_bytes: u64,
}

/// Result of one guard scan. Produced per invocation, never persisted.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// The ceiling the scan was run against.
    pub max_bytes: u64,
    /// Files strictly larger than `max_bytes`, largest first.
    pub oversized: Vec<OversizedFile>,
    /// Entries the walker could not read.
    pub skipped: Vec<SkippedEntry>,
    /// Regular files measured.
    pub files_scanned: usize,
    /// Total bytes across measured files.
    pub bytes_scanned: u64,
    /// Wall-clock duration of the walk.
    pub elapsed: Duration,
}

impl ScanReport {
    /// Whether every measured file stayed within the ceiling.
    ///
    /// A file of exactly `max_bytes` is within limits.
    #[must_use]
    pub fn within_limits(&self) -> bool {
        self.oversized.is_empty()
    }
}

/// Configured size gate for one scan root.
pub struct SizeGuard {
    config: WalkerConfig,
    max_bytes: u64,
}

impl SizeGuard {
    /// Build a guard for `root` from guard configuration.
    pub fn new(root: &Path, guard: &GuardConfig) -> Result<Self> {
        Ok(Self {
            config: WalkerConfig::from_guard(root, guard)?,
            max_bytes: guard.max_file_size_bytes,
        })
    }

    /// Override the byte ceiling (CLI `--max-bytes`).
    #[must_use]
    pub const fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// The scan root after normalization.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// The effective byte ceiling.
    #[must_use]
    pub const fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Walk the tree once and report.
    #[must_use]
    pub fn scan(&self) -> ScanReport {
        let start = Instant::now();
        let data = walker::walk(&self.config);

        let files_scanned = data.files.len();
        let bytes_scanned = data.files.iter().map(|f| f.size_bytes).sum();

        let mut oversized: Vec<OversizedFile> = data
            .files
            .into_iter()
            .filter(|f| f.size_bytes > self.max_bytes)
            .map(|f| OversizedFile {
                rel_path: f.rel_path,
                size_bytes: f.size_bytes,
            })
            .collect();
        oversized.sort_by(|a, b| {
            b.size_bytes
                .cmp(&a.size_bytes)
                .then_with(|| a.rel_path.cmp(&b.rel_path))
        });

        ScanReport {
            max_bytes: self.max_bytes,
            oversized,
            skipped: data.skipped,
            files_scanned,
            bytes_scanned,
            elapsed: start.elapsed(),
        }
    }
}

/// Check that no file under `root` exceeds `max_bytes`.
///
/// The boolean facade used by the CI gate: scans with default guard settings,
/// prints a report line per offending file to stdout and a warning per
/// unreadable entry to stderr, and returns `true` when the tree is within
/// limits. Never fails — an unreadable root scans as empty.
pub fn check_repo_size(root: impl AsRef<Path>, max_bytes: u64) -> bool {
    let guard_cfg = GuardConfig {
        max_file_size_bytes: max_bytes,
        ..GuardConfig::default()
    };
    // Default config carries no user patterns, so construction cannot fail.
    let Ok(guard) = SizeGuard::new(root.as_ref(), &guard_cfg) else {
        return true;
    };
    let report = guard.scan();

    for skip in &report.skipped {
        eprintln!(
            "[MAI-GUARD] warning: skipping {}: {}",
            skip.path.display(),
            skip.reason
        );
    }

    if !report.within_limits() {
        println!("Found files exceeding size limit:");
        for file in &report.oversized {
            println!(
                "  {}: {}",
                file.rel_path.display(),
                format_bytes(file.size_bytes)
            );
        }
        return false;
    }

    true
}

/// Check `root` against the default 200 MiB ceiling.
pub fn check_repo_size_default(root: impl AsRef<Path>) -> bool {
    check_repo_size(root, DEFAULT_MAX_FILE_SIZE_BYTES)
}

/// Human-readable byte count.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;
    const TIB: u64 = 1024 * GIB;

    if bytes >= TIB {
        format!("{:.1} TB", bytes as f64 / TIB as f64)
    } else if bytes >= GIB {
        format!("{:.1} GB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    fn write_file(path: &Path, len: u64) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let file = fs::File::create(path).unwrap();
        // Sparse: size without data, so oversized fixtures stay cheap.
        file.set_len(len).unwrap();
    }

    fn scan(root: &Path, max_bytes: u64) -> ScanReport {
        let cfg = GuardConfig {
            max_file_size_bytes: max_bytes,
            ..GuardConfig::default()
        };
        SizeGuard::new(root, &cfg).unwrap().scan()
    }

    #[test]
    fn small_files_pass() {
        let tmp = tempfile::tempdir().unwrap();
        for i in 0..5 {
            write_file(&tmp.path().join(format!("f{i}.bin")), 1024);
        }

        let report = scan(tmp.path(), 200 * 1024 * 1024);
        assert!(report.within_limits());
        assert_eq!(report.files_scanned, 5);
        assert_eq!(report.bytes_scanned, 5 * 1024);
        assert!(check_repo_size(tmp.path(), 200 * 1024 * 1024));
    }

    #[test]
    fn oversized_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(&tmp.path().join("model.bin"), 300 * 1024 * 1024);
        write_file(&tmp.path().join("small.bin"), 1024);

        let report = scan(tmp.path(), 200 * 1024 * 1024);
        assert!(!report.within_limits());
        assert_eq!(report.oversized.len(), 1);
        assert_eq!(report.oversized[0].rel_path, PathBuf::from("model.bin"));
        assert!(!check_repo_size(tmp.path(), 200 * 1024 * 1024));
    }

    #[test]
    fn exact_threshold_is_within_limits() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(&tmp.path().join("edge.bin"), 4096);

        let report = scan(tmp.path(), 4096);
        assert!(report.within_limits());

        // One byte over tips the gate.
        write_file(&tmp.path().join("over.bin"), 4097);
        let report = scan(tmp.path(), 4096);
        assert!(!report.within_limits());
        assert_eq!(report.oversized[0].rel_path, PathBuf::from("over.bin"));
    }

    #[test]
    fn repeated_scans_agree() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(&tmp.path().join("a.bin"), 2048);
        write_file(&tmp.path().join("b.bin"), 100);

        let first = scan(tmp.path(), 1024);
        let second = scan(tmp.path(), 1024);
        assert_eq!(first.within_limits(), second.within_limits());
        assert_eq!(first.oversized, second.oversized);
        assert_eq!(first.files_scanned, second.files_scanned);
    }

    #[test]
    fn oversized_sorted_largest_first() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(&tmp.path().join("mid.bin"), 3000);
        write_file(&tmp.path().join("big.bin"), 5000);
        write_file(&tmp.path().join("tiny.bin"), 10);

        let report = scan(tmp.path(), 1024);
        let names: Vec<_> = report
            .oversized
            .iter()
            .map(|f| f.rel_path.display().to_string())
            .collect();
        assert_eq!(names, vec!["big.bin", "mid.bin"]);
    }

    #[test]
    fn vcs_dirs_never_trip_the_gate() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(&tmp.path().join(".git/objects/pack/big.pack"), 10_000);
        write_file(&tmp.path().join("src/ok.rs"), 10);

        assert!(check_repo_size(tmp.path(), 1024));
    }

    #[test]
    fn empty_tree_passes() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(check_repo_size(tmp.path(), 1));
    }

    #[test]
    fn missing_root_passes_with_warning() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(check_repo_size(tmp.path().join("gone"), 1024));
    }

    #[test]
    fn format_bytes_scales() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(300 * 1024 * 1024), "300.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    mod properties {
        use super::*;

        use proptest::prelude::*;

        const CEILING: u64 = 1024;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn trees_within_ceiling_always_pass(
                sizes in prop::collection::vec(0u64..=CEILING, 1..16)
            ) {
                let tmp = tempfile::tempdir().unwrap();
                for (i, size) in sizes.iter().enumerate() {
                    write_file(&tmp.path().join(format!("f{i}.bin")), *size);
                }
                prop_assert!(check_repo_size(tmp.path(), CEILING));
            }

            #[test]
            fn one_oversized_file_always_fails(
                sizes in prop::collection::vec(0u64..=CEILING, 0..8),
                excess in 1u64..=4096,
            ) {
                let tmp = tempfile::tempdir().unwrap();
                for (i, size) in sizes.iter().enumerate() {
                    write_file(&tmp.path().join(format!("f{i}.bin")), *size);
                }
                write_file(&tmp.path().join("offender.bin"), CEILING + excess);
                prop_assert!(!check_repo_size(tmp.path(), CEILING));
            }
        }
    }
}
