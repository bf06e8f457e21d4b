//! Single-slot JSON persistence.
//!
//! Three small documents back the application: the transfer state checkpoint,
//! the settings document, and the recent-URL history. Each lives in its own
//! file and is always replaced whole, never patched in place.

mod history;
mod settings;
mod state;

pub use history::{HISTORY_CAPACITY, UrlHistory};
pub use settings::Settings;
pub use state::{StateStore, StateStoreError, TransferState};

/// File name of the transfer-state checkpoint document.
pub const STATE_FILE: &str = "download_state.json";

/// File name of the settings document.
pub const SETTINGS_FILE: &str = "settings.json";

/// File name of the recent-URL history document.
pub const HISTORY_FILE: &str = "history.json";
