//! Activity logging.

pub mod jsonl;

pub use jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
