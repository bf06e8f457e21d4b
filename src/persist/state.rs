//! Persisted transfer state and its single-slot store.
//!
//! One process owns at most one in-flight transfer, so the store is a single
//! JSON file that is replaced whole on every checkpoint. The field names are
//! part of the on-disk contract and must not change.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// The persisted record of an in-progress download.
///
/// `downloaded_bytes` is only ever written after the bytes it claims have
/// been flushed to the staging file, so a recovered record never promises
/// more data than the file actually holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferState {
    /// The resource being fetched.
    #[serde(rename = "Url")]
    pub url: String,

    /// Absolute path of the staging file receiving bytes.
    #[serde(rename = "FilePath")]
    pub file_path: PathBuf,

    /// Declared content length; `0` means the server did not report one.
    #[serde(rename = "TotalBytes")]
    pub total_bytes: u64,

    /// Bytes durably written to the staging file.
    #[serde(rename = "DownloadedBytes")]
    pub downloaded_bytes: u64,

    /// Time of the last checkpoint write.
    #[serde(rename = "StartTime")]
    pub recorded_at: DateTime<Utc>,
}

impl TransferState {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        file_path: impl Into<PathBuf>,
        total_bytes: u64,
        downloaded_bytes: u64,
    ) -> Self {
        Self {
            url: url.into(),
            file_path: file_path.into(),
            total_bytes,
            downloaded_bytes,
            recorded_at: Utc::now(),
        }
    }
}

/// Errors from reading or writing the state document.
#[derive(Debug, Error)]
pub enum StateStoreError {
    /// Reading the state file failed.
    #[error("failed to read transfer state from {path}: {source}")]
    Read {
        /// The state file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Writing the state file failed.
    #[error("failed to write transfer state to {path}: {source}")]
    Write {
        /// The state file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The state file exists but does not hold a valid record.
    #[error("transfer state in {path} is not valid: {source}")]
    Parse {
        /// The state file path.
        path: PathBuf,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

/// Durable single-slot persistence for one [`TransferState`].
///
/// Writes are whole-record replacements staged through a sibling temp file
/// and renamed into place, so a crash mid-write leaves either the previous
/// record or the new one, never a torn document.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Creates a store backed by the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::Write`] when the document cannot be
    /// written, or [`StateStoreError::Parse`] when it cannot be encoded.
    pub async fn save(&self, state: &TransferState) -> Result<(), StateStoreError> {
        let json = serde_json::to_string_pretty(state).map_err(|source| {
            StateStoreError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json.as_bytes())
            .await
            .map_err(|source| StateStoreError::Write {
                path: temp_path.clone(),
                source,
            })?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|source| StateStoreError::Write {
                path: self.path.clone(),
                source,
            })?;

        debug!(
            path = %self.path.display(),
            downloaded = state.downloaded_bytes,
            total = state.total_bytes,
            "checkpoint written"
        );
        Ok(())
    }

    /// Loads the stored record, or `None` when the slot is empty.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::Read`] on IO failure and
    /// [`StateStoreError::Parse`] when the file holds invalid JSON.
    pub async fn load(&self) -> Result<Option<TransferState>, StateStoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StateStoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let state = serde_json::from_str(&content).map_err(|source| StateStoreError::Parse {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(state))
    }

    /// Deletes the stored record. Succeeds when the slot is already empty.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::Write`] when an existing file cannot be
    /// removed.
    pub async fn clear(&self) -> Result<(), StateStoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StateStoreError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
