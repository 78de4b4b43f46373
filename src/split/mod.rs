//! PR splitting: raw PR records in, atomic-diff records out.

pub mod atomic;
pub mod cache;
pub mod diff;
#[cfg(feature = "fetch")]
pub mod fetch;
pub mod ndjson;

pub use atomic::{
    AtomicDiff, DiffSource, RawPrRecord, SkipReason, SplitOutcome, SplitRecord, Splitter,
};
pub use cache::{CacheOnlySource, CacheStatus, DiffCache};
pub use diff::{FileDiff, count_loc, group_by_directory, parse_diff};
#[cfg(feature = "fetch")]
pub use fetch::{DiffFetcher, FetchingSource, convert_to_api_url};
pub use ndjson::{NdjsonReader, NdjsonWriter};
