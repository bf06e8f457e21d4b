//! Application settings document.
//!
//! A single-slot JSON file holding the configured download directory. A
//! missing or unreadable document falls back to a per-user downloads
//! subdirectory so the application always has somewhere to write.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Persisted application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory that receives completed downloads.
    #[serde(rename = "DownloadDirectory")]
    pub download_directory: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            download_directory: default_download_directory(),
        }
    }
}

/// Per-user downloads subdirectory used when no settings exist.
fn default_download_directory() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dlm")
}

impl Settings {
    /// Loads settings from `path`, falling back to defaults when the file is
    /// missing, unreadable, or holds a blank directory.
    pub async fn load(path: &Path) -> Self {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(error) => {
                if error.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %error, "settings unreadable, using defaults");
                }
                return Self::default();
            }
        };

        match serde_json::from_str::<Self>(&content) {
            Ok(settings) if !settings.download_directory.as_os_str().is_empty() => settings,
            Ok(_) => Self::default(),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "settings invalid, using defaults");
                Self::default()
            }
        }
    }

    /// Writes the settings document.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error; callers treat persistence of
    /// settings as best-effort.
    pub async fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        tokio::fs::write(path, json.as_bytes()).await
    }
}
