//! Content-addressed on-disk cache for downloaded diffs.
//!
//! Keyed by the SHA-256 of the requested URL, one file per diff, no expiry.
//! Writes go through a temp file + rename so a crashed run never leaves a
//! truncated entry behind.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::core::errors::{MaiError, Result};
use crate::split::atomic::DiffSource;

/// On-disk diff cache rooted at one directory.
#[derive(Debug, Clone)]
pub struct DiffCache {
    dir: PathBuf,
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatus {
    /// Number of cached diffs.
    pub entries: u64,
    /// Total bytes across cached diffs.
    pub total_bytes: u64,
}

impl DiffCache {
    /// Open a cache rooted at `dir`. The directory is created lazily on the
    /// first `store`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The cache root.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache key for a URL: lowercase hex SHA-256.
    #[must_use]
    pub fn key(url: &str) -> String {
        let digest = Sha256::digest(url.as_bytes());
        let mut out = String::with_capacity(64);
        for byte in digest {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        self.dir.join(Self::key(url))
    }

    /// Return the cached diff for `url`, if present.
    #[must_use]
    pub fn lookup(&self, url: &str) -> Option<String> {
        fs::read_to_string(self.entry_path(url)).ok()
    }

    /// Store a diff for `url`, replacing any previous entry.
    pub fn store(&self, url: &str, content: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|source| MaiError::io(&self.dir, source))?;

        let final_path = self.entry_path(url);
        let tmp_path = final_path.with_extension("tmp");
        fs::write(&tmp_path, content).map_err(|source| MaiError::io(&tmp_path, source))?;
        fs::rename(&tmp_path, &final_path).map_err(|source| MaiError::io(&final_path, source))?;
        Ok(())
    }

    /// Count entries and bytes. A missing cache directory is an empty cache.
    pub fn status(&self) -> Result<CacheStatus> {
        let mut status = CacheStatus {
            entries: 0,
            total_bytes: 0,
        };

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(status),
            Err(source) => return Err(MaiError::io(&self.dir, source)),
        };

        for entry in entries {
            let entry = entry.map_err(|source| MaiError::io(&self.dir, source))?;
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if meta.is_file() {
                status.entries += 1;
                status.total_bytes += meta.len();
            }
        }

        Ok(status)
    }

    /// Remove every cached entry. Returns the number of files removed.
    pub fn clear(&self) -> Result<u64> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(source) => return Err(MaiError::io(&self.dir, source)),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|source| MaiError::io(&self.dir, source))?;
            let path = entry.path();
            if path.is_file() {
                fs::remove_file(&path).map_err(|source| MaiError::io(&path, source))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Cache-only diff source: misses are hard errors, nothing touches the
/// network. Used for offline split runs and tests.
pub struct CacheOnlySource {
    cache: DiffCache,
}

impl CacheOnlySource {
    #[must_use]
    pub fn new(cache: DiffCache) -> Self {
        Self { cache }
    }
}

impl DiffSource for CacheOnlySource {
    fn diff_text(&mut self, url: &str) -> Result<String> {
        self.cache
            .lookup(url)
            .ok_or_else(|| MaiError::DiffNotCached {
                url: url.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_lookup_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiffCache::new(tmp.path().join("diffs"));

        let url = "https://github.com/o/r/pull/1.diff";
        assert!(cache.lookup(url).is_none());

        cache.store(url, "diff --git a/x b/x\n").unwrap();
        assert_eq!(cache.lookup(url).as_deref(), Some("diff --git a/x b/x\n"));
    }

    #[test]
    fn keys_are_stable_hex_sha256() {
        let key = DiffCache::key("hello");
        assert_eq!(key.len(), 64);
        assert_eq!(
            key,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(key, DiffCache::key("hello"));
        assert_ne!(key, DiffCache::key("hello2"));
    }

    #[test]
    fn status_and_clear() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiffCache::new(tmp.path().join("diffs"));

        assert_eq!(
            cache.status().unwrap(),
            CacheStatus {
                entries: 0,
                total_bytes: 0
            }
        );

        cache.store("u1", "aaaa").unwrap();
        cache.store("u2", "bb").unwrap();

        let status = cache.status().unwrap();
        assert_eq!(status.entries, 2);
        assert_eq!(status.total_bytes, 6);

        assert_eq!(cache.clear().unwrap(), 2);
        assert_eq!(cache.status().unwrap().entries, 0);
    }

    #[test]
    fn cache_only_source_errors_on_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiffCache::new(tmp.path().join("diffs"));
        cache.store("hit", "text").unwrap();

        let mut source = CacheOnlySource::new(cache);
        assert_eq!(source.diff_text("hit").unwrap(), "text");
        let err = source.diff_text("miss").unwrap_err();
        assert_eq!(err.code(), "MAI-2203");
    }
}
