//! JSONL activity log: append-only line-delimited JSON.
//!
//! Each line is a self-contained JSON object. Lines are assembled in memory
//! and written atomically via `write_all` to prevent interleaved partial
//! lines when the file is being tailed by another process.
//!
//! Degradation chain:
//! 1. Primary file path
//! 2. Optional fallback path
//! 3. stderr with `[MAI-JSONL]` prefix
//! 4. Silent discard (logging must never change a gate's exit code)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions, rename};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Log event types matching the mai_data activity model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ScanComplete,
    OversizedFile,
    EntrySkipped,
    SplitComplete,
    RecordSplit,
    RecordSkipped,
    Error,
}

/// A single JSONL log entry — all fields optional except `ts`, `event`, `severity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    /// Event type identifier.
    pub event: EventType,
    /// Severity level.
    pub severity: Severity,
    /// Affected filesystem path (when applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Size in bytes of the affected item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Byte ceiling in force during a scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<u64>,
    /// Files measured during a scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_scanned: Option<u64>,
    /// PR identifier for split events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_id: Option<String>,
    /// Repository for split events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    /// Atomic diffs produced for a split record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_count: Option<u64>,
    /// Duration of the action in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Whether the action succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// MAI error code if the action failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Human-readable error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Freeform details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event,
            severity,
            path: None,
            size: None,
            max_bytes: None,
            files_scanned: None,
            pr_id: None,
            repo: None,
            diff_count: None,
            duration_ms: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }
}

/// Degradation state of the JSONL writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    /// Writing to primary path.
    Normal,
    /// Primary failed, writing to fallback path.
    Fallback,
    /// Both files failed, writing to stderr.
    Stderr,
    /// Everything failed, silently discarding.
    Discard,
}

/// Configuration for the JSONL writer.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    /// Primary log file path.
    pub path: PathBuf,
    /// Optional fallback path (e.g. on a different filesystem).
    pub fallback_path: Option<PathBuf>,
    /// Maximum file size before rotation (bytes). Default: 50 MiB.
    pub max_size_bytes: u64,
    /// Number of rotated files to keep. Default: 3.
    pub max_rotated_files: u32,
}

impl JsonlConfig {
    /// Config for a primary path with the default rotation policy.
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fallback_path: None,
            max_size_bytes: 50 * 1024 * 1024,
            max_rotated_files: 3,
        }
    }
}

/// Append-only JSONL log writer with rotation and multi-level fallback.
pub struct JsonlWriter {
    config: JsonlConfig,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    bytes_written: u64,
}

impl JsonlWriter {
    /// Open the JSONL log file. Falls through the degradation chain on failure.
    pub fn open(config: JsonlConfig) -> Self {
        let mut w = Self {
            config,
            writer: None,
            state: WriterState::Discard,
            bytes_written: 0,
        };
        w.try_open_primary();
        w
    }

    /// Write a single log entry as one atomic JSONL line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                // Serialization failure is a programming error; log to stderr and bail.
                let _ = writeln!(io::stderr(), "[MAI-JSONL] serialize error: {e}");
                return;
            }
        };

        self.write_line(&line);
    }

    /// Flush buffers.
    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Current degradation state.
    pub fn state(&self) -> &'static str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Fallback => "fallback",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    // ──────────────────────── internals ────────────────────────

    fn write_line(&mut self, line: &str) {
        if self.bytes_written + line.len() as u64 > self.config.max_size_bytes
            && matches!(self.state, WriterState::Normal | WriterState::Fallback)
        {
            self.rotate();
        }

        match self.state {
            WriterState::Normal | WriterState::Fallback => {
                if let Some(w) = self.writer.as_mut() {
                    if w.write_all(line.as_bytes()).is_err() {
                        self.degrade();
                        self.write_line(line); // retry at next level
                        return;
                    }
                    self.bytes_written += line.len() as u64;
                } else {
                    self.degrade();
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                let _ = write!(io::stderr(), "[MAI-JSONL] {line}");
            }
            WriterState::Discard => {
                // Silently drop.
            }
        }
    }

    fn try_open_primary(&mut self) {
        match open_append(&self.config.path) {
            Ok((file, size)) => {
                self.writer = Some(BufWriter::with_capacity(64 * 1024, file));
                self.state = WriterState::Normal;
                self.bytes_written = size;
            }
            Err(_) => {
                self.try_open_fallback();
            }
        }
    }

    fn try_open_fallback(&mut self) {
        if let Some(fb) = &self.config.fallback_path {
            match open_append(fb) {
                Ok((file, size)) => {
                    let _ = writeln!(
                        io::stderr(),
                        "[MAI-JSONL] primary path failed, using fallback: {}",
                        fb.display()
                    );
                    self.writer = Some(BufWriter::with_capacity(64 * 1024, file));
                    self.state = WriterState::Fallback;
                    self.bytes_written = size;
                }
                Err(_) => {
                    self.state = WriterState::Stderr;
                    let _ = writeln!(
                        io::stderr(),
                        "[MAI-JSONL] both primary and fallback paths failed, using stderr"
                    );
                }
            }
        } else {
            self.state = WriterState::Stderr;
            let _ = writeln!(
                io::stderr(),
                "[MAI-JSONL] primary path failed and no fallback configured, using stderr"
            );
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        match self.state {
            WriterState::Normal => {
                self.try_open_fallback();
            }
            WriterState::Fallback => {
                self.state = WriterState::Stderr;
                let _ = writeln!(
                    io::stderr(),
                    "[MAI-JSONL] fallback write failed, using stderr"
                );
            }
            WriterState::Stderr => {
                self.state = WriterState::Discard;
            }
            WriterState::Discard => {}
        }
    }

    fn rotate(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
        self.writer = None;

        let base = match self.state {
            WriterState::Normal => &self.config.path,
            WriterState::Fallback => match &self.config.fallback_path {
                Some(p) => p,
                None => return,
            },
            _ => return,
        };

        // Shift existing rotations: .3→delete, .2→.3, .1→.2, current→.1
        for i in (1..self.config.max_rotated_files).rev() {
            let from = rotated_name(base, i);
            let to = rotated_name(base, i + 1);
            let _ = rename(&from, &to);
        }
        let oldest = rotated_name(base, self.config.max_rotated_files);
        let _ = fs::remove_file(&oldest);
        let _ = rename(base, &rotated_name(base, 1));

        match open_append(base) {
            Ok((file, _)) => {
                self.writer = Some(BufWriter::with_capacity(64 * 1024, file));
                self.bytes_written = 0;
            }
            Err(_) => {
                self.degrade();
            }
        }
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

fn open_append(path: &Path) -> io::Result<(File, u64)> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::BufRead;

    fn read_lines(path: &Path) -> Vec<String> {
        let file = File::open(path).unwrap();
        io::BufReader::new(file)
            .lines()
            .map(|l| l.unwrap())
            .collect()
    }

    #[test]
    fn entries_are_single_json_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("activity.jsonl");
        let mut writer = JsonlWriter::open(JsonlConfig::for_path(&path));

        let mut entry = LogEntry::new(EventType::ScanComplete, Severity::Info);
        entry.files_scanned = Some(42);
        entry.ok = Some(true);
        writer.write_entry(&entry);
        writer.flush();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 1);
        let parsed: LogEntry = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(parsed.event, EventType::ScanComplete);
        assert_eq!(parsed.files_scanned, Some(42));
    }

    #[test]
    fn none_fields_are_omitted() {
        let entry = LogEntry::new(EventType::RecordSkipped, Severity::Warning);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("record_skipped"));
        assert!(!json.contains("pr_id"));
        assert!(!json.contains("error_code"));
    }

    #[test]
    fn rotation_keeps_newest_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("activity.jsonl");
        let config = JsonlConfig {
            path: path.clone(),
            fallback_path: None,
            max_size_bytes: 256,
            max_rotated_files: 2,
        };
        let mut writer = JsonlWriter::open(config);

        for _ in 0..16 {
            writer.write_entry(&LogEntry::new(EventType::ScanComplete, Severity::Info));
            writer.flush();
        }
        drop(writer);

        assert!(path.exists());
        assert!(rotated_name(&path, 1).exists());
        // Active file stays under the cap.
        assert!(fs::metadata(&path).unwrap().len() <= 256);
    }

    #[test]
    fn unwritable_primary_degrades_without_error() {
        let tmp = tempfile::tempdir().unwrap();
        // Primary under a path that is a *file*, so create_dir_all fails.
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let bad_primary = blocker.join("activity.jsonl");
        let fallback = tmp.path().join("fallback.jsonl");

        let config = JsonlConfig {
            path: bad_primary,
            fallback_path: Some(fallback.clone()),
            max_size_bytes: 1024 * 1024,
            max_rotated_files: 2,
        };
        let mut writer = JsonlWriter::open(config);
        assert_eq!(writer.state(), "fallback");

        writer.write_entry(&LogEntry::new(EventType::Error, Severity::Critical));
        writer.flush();
        assert_eq!(read_lines(&fallback).len(), 1);
    }
}
