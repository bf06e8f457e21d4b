//! Recent-URL history document.
//!
//! An ordered, de-duplicated list of the last downloaded URLs, most recent
//! first, capped at ten entries. Stored as a plain JSON string array so the
//! document stays trivially inspectable.

use std::path::PathBuf;

use tracing::warn;

/// Maximum number of URLs the history retains.
pub const HISTORY_CAPACITY: usize = 10;

/// Most-recent-first list of downloaded URLs.
#[derive(Debug)]
pub struct UrlHistory {
    path: PathBuf,
    entries: Vec<String>,
}

impl UrlHistory {
    /// Loads the history from `path`; a missing or invalid document yields an
    /// empty history.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<Vec<String>>(&content) {
                Ok(entries) => entries,
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "history invalid, starting empty");
                    Vec::new()
                }
            },
            Err(error) => {
                if error.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %error, "history unreadable, starting empty");
                }
                Vec::new()
            }
        };
        Self { path, entries }
    }

    /// Creates an empty history backed by `path` without touching the disk.
    #[must_use]
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
        }
    }

    /// Returns the entries, most recent first.
    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Records a URL at the front of the history.
    ///
    /// Re-recording an existing URL moves it to the front instead of
    /// duplicating it; the list is then truncated to capacity and persisted
    /// best-effort.
    pub async fn record(&mut self, url: &str) {
        let url = url.trim();
        if url.is_empty() {
            return;
        }

        self.entries.retain(|entry| entry != url);
        self.entries.insert(0, url.to_string());
        self.entries.truncate(HISTORY_CAPACITY);

        if let Err(error) = self.persist().await {
            warn!(path = %self.path.display(), error = %error, "failed to persist history");
        }
    }

    async fn persist(&self) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(&self.entries).map_err(std::io::Error::other)?;
        tokio::fs::write(&self.path, json.as_bytes()).await
    }
}
