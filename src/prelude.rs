//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use mai_data::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{MaiError, Result};

// Guard
pub use crate::guard::report::{
    OversizedFile, ScanReport, SizeGuard, check_repo_size, check_repo_size_default,
};
pub use crate::guard::walker::{FileRecord, SkippedEntry};

// Split
pub use crate::split::atomic::{
    AtomicDiff, DiffSource, RawPrRecord, SkipReason, SplitOutcome, SplitRecord, Splitter,
};
pub use crate::split::cache::{CacheOnlySource, DiffCache};
#[cfg(feature = "fetch")]
pub use crate::split::fetch::{DiffFetcher, FetchingSource};
pub use crate::split::ndjson::{NdjsonReader, NdjsonWriter};

// Logger
pub use crate::logger::jsonl::{JsonlConfig, JsonlWriter, LogEntry};
