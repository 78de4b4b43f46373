//! MAI-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, MaiError>;

/// Top-level error type for mai_data.
#[derive(Debug, Error)]
pub enum MaiError {
    #[error("[MAI-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[MAI-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[MAI-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[MAI-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[MAI-2102] malformed record on line {line}: {details}")]
    MalformedRecord { line: usize, details: String },

    #[error("[MAI-2201] diff fetch failure for {url}: {details}")]
    Fetch { url: String, details: String },

    #[error("[MAI-2202] diff vanished (repo deleted/private): {url}")]
    DiffVanished { url: String },

    #[error("[MAI-2203] diff not cached and fetching is disabled: {url}")]
    DiffNotCached { url: String },

    #[error("[MAI-3001] permission denied for {path}")]
    PermissionDenied { path: PathBuf },

    #[error("[MAI-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[MAI-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl MaiError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "MAI-1001",
            Self::MissingConfig { .. } => "MAI-1002",
            Self::ConfigParse { .. } => "MAI-1003",
            Self::Serialization { .. } => "MAI-2101",
            Self::MalformedRecord { .. } => "MAI-2102",
            Self::Fetch { .. } => "MAI-2201",
            Self::DiffVanished { .. } => "MAI-2202",
            Self::DiffNotCached { .. } => "MAI-2203",
            Self::PermissionDenied { .. } => "MAI-3001",
            Self::Io { .. } => "MAI-3002",
            Self::Runtime { .. } => "MAI-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Fetch { .. } | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for MaiError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for MaiError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
