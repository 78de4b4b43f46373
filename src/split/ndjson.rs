//! NDJSON stream I/O for PR records.
//!
//! One JSON object per line. The reader skips blank lines; the writer emits
//! one complete line per record so a tailing process never sees a partial
//! object.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::errors::{MaiError, Result};

/// Streaming NDJSON reader.
pub struct NdjsonReader<T> {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
    _marker: std::marker::PhantomData<T>,
}

impl<T: DeserializeOwned> NdjsonReader<T> {
    /// Open `path` for record-by-record reading.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| MaiError::io(path, source))?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            line_no: 0,
            _marker: std::marker::PhantomData,
        })
    }
}

impl<T: DeserializeOwned> Iterator for NdjsonReader<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(source) => return Some(Err(MaiError::io(&self.path, source))),
            };
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }

            return Some(serde_json::from_str(&line).map_err(|e| MaiError::MalformedRecord {
                line: self.line_no,
                details: e.to_string(),
            }));
        }
    }
}

/// Buffered NDJSON writer.
pub struct NdjsonWriter {
    path: PathBuf,
    inner: BufWriter<File>,
}

impl NdjsonWriter {
    /// Create (truncate) `path`, creating parent directories as needed.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| MaiError::io(parent, source))?;
        }
        let file = File::create(path).map_err(|source| MaiError::io(path, source))?;
        Ok(Self {
            path: path.to_path_buf(),
            inner: BufWriter::new(file),
        })
    }

    /// Append one record as a single line.
    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        self.inner
            .write_all(line.as_bytes())
            .map_err(|source| MaiError::io(&self.path, source))
    }

    /// Flush and close.
    pub fn finish(mut self) -> Result<()> {
        self.inner
            .flush()
            .map_err(|source| MaiError::io(&self.path, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::split::atomic::RawPrRecord;

    #[test]
    fn reads_records_skipping_blank_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("in.ndjson");
        std::fs::write(
            &path,
            "{\"pr_id\": 1, \"diff_url\": \"u1\"}\n\n   \n{\"pr_id\": 2}\n",
        )
        .unwrap();

        let records: Vec<RawPrRecord> = NdjsonReader::open(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].diff_url.as_deref(), Some("u1"));
        assert!(records[1].diff_url.is_none());
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("in.ndjson");
        std::fs::write(&path, "{\"pr_id\": 1}\nnot json\n").unwrap();

        let results: Vec<Result<RawPrRecord>> = NdjsonReader::open(&path).unwrap().collect();
        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err();
        assert_eq!(err.code(), "MAI-2102");
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn writer_creates_parent_dirs_and_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/out.ndjson");

        let mut writer = NdjsonWriter::create(&path).unwrap();
        writer
            .write(&RawPrRecord {
                pr_id: Some(serde_json::Value::from(9)),
                ..RawPrRecord::default()
            })
            .unwrap();
        writer.finish().unwrap();

        let back: Vec<RawPrRecord> = NdjsonReader::open(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].pr_id, Some(serde_json::Value::from(9)));
    }

    #[test]
    fn missing_input_is_an_io_error() {
        let err = NdjsonReader::<RawPrRecord>::open(Path::new("/nonexistent/in.ndjson"))
            .err()
            .unwrap();
        assert_eq!(err.code(), "MAI-3002");
    }
}
