//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{MaiError, Result};
use crate::core::paths::VCS_DIR_NAMES;

/// Full mai_data configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub guard: GuardConfig,
    pub split: SplitConfig,
    pub fetch: FetchConfig,
    pub paths: PathsConfig,
}

/// Size guard thresholds and traversal constraints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GuardConfig {
    /// Per-file byte ceiling. Files strictly larger than this fail the gate.
    pub max_file_size_bytes: u64,
    /// Directory names skipped wherever they appear in the tree.
    pub excluded_dirs: Vec<String>,
    /// Absolute paths skipped entirely.
    pub excluded_paths: Vec<PathBuf>,
    /// Regex patterns matched against root-relative paths; matches are skipped.
    pub excluded_patterns: Vec<String>,
    /// Filename suffixes whose files are not counted against the threshold.
    pub ignored_suffixes: Vec<String>,
    pub follow_symlinks: bool,
    pub max_depth: usize,
}

/// PR splitting thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SplitConfig {
    /// A directory group with more added lines than this is exploded per file.
    pub max_loc: usize,
    /// When a PR touches at least this many top-level directories, every
    /// group is exploded per file.
    pub max_dirs: usize,
    /// Records producing fewer atomic diffs than this are dropped.
    pub min_diffs: usize,
}

/// Diff download behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Minimum milliseconds between requests to the same host.
    pub host_pacing_ms: HashMap<String, u64>,
}

/// Filesystem paths used by mai_data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub cache_dir: PathBuf,
    pub jsonl_log: PathBuf,
}

/// Default per-file ceiling: 200 MiB.
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 200 * 1024 * 1024;

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            excluded_dirs: VCS_DIR_NAMES.iter().map(ToString::to_string).collect(),
            excluded_paths: Vec::new(),
            excluded_patterns: Vec::new(),
            ignored_suffixes: Vec::new(),
            follow_symlinks: false,
            max_depth: 128,
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            max_loc: 500,
            max_dirs: 3,
            min_diffs: 2,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        let mut host_pacing_ms = HashMap::new();
        host_pacing_ms.insert("api.github.com".to_string(), 1_000);
        host_pacing_ms.insert("patch-diff.githubusercontent.com".to_string(), 1_600);
        Self {
            timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 500,
            host_pacing_ms,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[MAI-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("mai-data").join("config.toml");
        let cache = home_dir.join(".cache").join("mai-data").join("diffs");
        let data = home_dir.join(".local").join("share").join("mai-data");
        Self {
            config_file: cfg,
            cache_dir: cache,
            jsonl_log: data.join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| MaiError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(MaiError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides()?;
        cfg.normalize_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for log correlation.
    ///
    /// Uses FNV-1a for cross-process-stable hashing (no `DefaultHasher`
    /// whose seed may vary across Rust releases).
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        // guard
        set_env_u64(
            "MAI_GUARD_MAX_FILE_SIZE_BYTES",
            &mut self.guard.max_file_size_bytes,
        )?;
        set_env_bool("MAI_GUARD_FOLLOW_SYMLINKS", &mut self.guard.follow_symlinks)?;
        set_env_usize("MAI_GUARD_MAX_DEPTH", &mut self.guard.max_depth)?;

        // split
        set_env_usize("MAI_SPLIT_MAX_LOC", &mut self.split.max_loc)?;
        set_env_usize("MAI_SPLIT_MAX_DIRS", &mut self.split.max_dirs)?;
        set_env_usize("MAI_SPLIT_MIN_DIFFS", &mut self.split.min_diffs)?;

        // fetch
        set_env_u64("MAI_FETCH_TIMEOUT_SECS", &mut self.fetch.timeout_secs)?;
        set_env_u32("MAI_FETCH_MAX_RETRIES", &mut self.fetch.max_retries)?;
        set_env_u64(
            "MAI_FETCH_RETRY_BACKOFF_MS",
            &mut self.fetch.retry_backoff_ms,
        )?;

        // paths
        if let Some(raw) = env_var("MAI_CACHE_DIR") {
            self.paths.cache_dir = PathBuf::from(raw);
        }
        if let Some(raw) = env_var("MAI_JSONL_LOG") {
            self.paths.jsonl_log = PathBuf::from(raw);
        }

        Ok(())
    }

    /// Normalize paths for consistent comparison.
    fn normalize_paths(&mut self) {
        for path in &mut self.guard.excluded_paths {
            let s = path.to_string_lossy();
            if s.len() > 1
                && let Some(stripped) = s.strip_suffix('/')
            {
                *path = PathBuf::from(stripped);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.guard.max_file_size_bytes == 0 {
            return Err(MaiError::InvalidConfig {
                details: "guard.max_file_size_bytes must be >= 1".to_string(),
            });
        }
        if self.guard.max_depth == 0 {
            return Err(MaiError::InvalidConfig {
                details: "guard.max_depth must be >= 1".to_string(),
            });
        }
        for pattern in &self.guard.excluded_patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(MaiError::InvalidConfig {
                    details: format!("guard.excluded_patterns entry {pattern:?} is invalid: {e}"),
                });
            }
        }

        if self.split.max_dirs == 0 {
            return Err(MaiError::InvalidConfig {
                details: "split.max_dirs must be >= 1".to_string(),
            });
        }
        if self.split.min_diffs == 0 {
            return Err(MaiError::InvalidConfig {
                details: "split.min_diffs must be >= 1".to_string(),
            });
        }

        if self.fetch.timeout_secs == 0 {
            return Err(MaiError::InvalidConfig {
                details: "fetch.timeout_secs must be >= 1".to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn set_env_u64(name: &str, slot: &mut u64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = parse_env_int(name, &raw)?;
    }
    Ok(())
}

fn set_env_u32(name: &str, slot: &mut u32) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = parse_env_int(name, &raw)?;
    }
    Ok(())
}

fn set_env_usize(name: &str, slot: &mut usize) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = parse_env_int(name, &raw)?;
    }
    Ok(())
}

fn set_env_bool(name: &str, slot: &mut bool) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            other => {
                return Err(MaiError::InvalidConfig {
                    details: format!("{name} must be a boolean, got {other:?}"),
                });
            }
        };
    }
    Ok(())
}

fn parse_env_int<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| MaiError::InvalidConfig {
        details: format!("{name} must be an integer, got {raw:?}"),
    })
}
