#![forbid(unsafe_code)]

//! mai_data — data utilities for PR corpus curation.
//!
//! Two tools around one dataset:
//! 1. **Size guard** — CI gate verifying no repository file exceeds a byte
//!    threshold (default 200 MiB)
//! 2. **PR splitter** — turns raw PR records (NDJSON) into atomic diffs,
//!    one combined diff per top-level directory or per-file when a group is
//!    too large
//!
//! The static SQL presets under `queries/` belong to the same dataset but
//! are handed verbatim to the warehouse; this crate never executes them.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use mai_data::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use mai_data::core::config::Config;
//! use mai_data::guard::check_repo_size;
//! ```

pub mod prelude;

pub mod core;
pub mod guard;
pub mod logger;
pub mod split;
