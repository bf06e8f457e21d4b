//! Error types for the transfer module.
//!
//! Every failure mode of a transfer attempt is represented here so the engine
//! can map it onto the right cleanup path and a user-facing status line.

use std::path::PathBuf;

use thiserror::Error;

use crate::persist::StateStoreError;

/// Errors that can occur during a transfer attempt.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The URL points at a web page rather than a downloadable file.
    #[error("{url} serves {content_type}, not a direct file link")]
    NotAFile {
        /// The URL that was classified.
        url: String,
        /// The media type the server declared.
        content_type: String,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Response body stream failed mid-transfer.
    #[error("connection interrupted while downloading {url}: {source}")]
    Stream {
        /// The URL whose body stream failed.
        url: String,
        /// The underlying stream error.
        #[source]
        source: std::io::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error during the transfer (open, write, rename, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Persisting the progress checkpoint failed.
    ///
    /// Fatal to the attempt: a transfer whose progress cannot be recorded
    /// would not be recoverable after a crash anyway.
    #[error("checkpoint persistence failed: {0}")]
    Checkpoint(#[from] StateStoreError),

    /// The transfer was cancelled by the caller.
    #[error("download cancelled")]
    Cancelled,
}

impl TransferError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a not-a-file classification error.
    pub fn not_a_file(url: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self::NotAFile {
            url: url.into(),
            content_type: content_type.into(),
        }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a body-stream error.
    pub fn stream(url: impl Into<String>, source: std::io::Error) -> Self {
        Self::Stream {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// Note on From trait implementations:
// There is intentionally no `From<reqwest::Error>` or `From<std::io::Error>`
// because those variants require context (url, path) that the source errors
// don't carry. The helper constructors are the pattern used at call sites.
