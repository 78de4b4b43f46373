//! Repository size guard: the CI gate verifying no file exceeds a byte
//! threshold.

pub mod report;
pub mod walker;

pub use report::{OversizedFile, ScanReport, SizeGuard, check_repo_size, check_repo_size_default};
pub use walker::{FileRecord, SkippedEntry, WalkData, WalkerConfig};
