//! Single-file HTTP transfer engine with pause, cancel, and range resume.
//!
//! The engine streams one resource at a time into a `.tmpdownload` staging
//! file, checkpointing progress so an interrupted transfer can continue from
//! its recorded offset.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use dlm_core::persist::{StateStore, UrlHistory};
//! use dlm_core::transfer::{DownloadEngine, EngineConfig, NullObserver};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = StateStore::new("download_state.json");
//! let history = UrlHistory::load("history.json").await;
//! let engine = DownloadEngine::new(
//!     EngineConfig::default(),
//!     store,
//!     history,
//!     Arc::new(NullObserver),
//! )?;
//! engine.start("https://example.com/file.zip", Path::new("./downloads"))?;
//! engine.wait().await;
//! # Ok(())
//! # }
//! ```

pub mod constants;
mod engine;
mod error;
pub mod filename;
mod progress;

pub use engine::{DownloadEngine, EngineConfig, EngineError, RunState};
pub use error::TransferError;
pub use progress::{
    NullObserver, ProgressUpdate, SpeedEstimator, TransferObserver, format_bytes, percentage,
};
