//! Error types for modpack-dl
//!
//! A single [`Error`] enum covers every failure the installer can surface.
//! Transfer failures are classified by [`crate::retry::IsRetryable`]; everything
//! touching the local filesystem carries the offending path.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for modpack-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for modpack-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "slots")
        key: Option<String>,
    },

    /// Manifest could not be built (duplicate ids, malformed entries)
    #[error("invalid manifest: {0}")]
    Manifest(String),

    /// Network error (connection refused, reset, timeout, truncated body)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status} for {url}")]
    HttpStatus {
        /// URL that was requested
        url: String,
        /// Status code returned by the server
        status: u16,
    },

    /// The final URL does not end in a usable file name
    #[error("cannot derive a file name from {url}")]
    InvalidFileName {
        /// Post-redirect URL the name was derived from
        url: String,
    },

    /// Create, write, rename or delete failed on a local path
    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        /// Path the operation targeted
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Out-of-band signal for an artifact the tracker does not know about
    #[error("unknown manual artifact: {0}")]
    UnknownArtifact(String),

    /// I/O error without path context
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap an I/O error with the path it happened on
    pub fn filesystem(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Build a configuration error for a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// True for errors caused by the local filesystem rather than the network
    pub fn is_filesystem(&self) -> bool {
        matches!(self, Error::Filesystem { .. } | Error::Io(_))
    }
}
