//! dlm core library
//!
//! This library implements a resumable, pausable, cancellable single-file
//! HTTP download engine with crash recovery. A transfer streams to a staging
//! file (`<name>.tmpdownload`), checkpoints its progress to a single-slot
//! JSON document, and is promoted to its final name only on completion.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`transfer`] - the download engine, filename derivation, progress reporting
//! - [`persist`] - single-slot JSON persistence (transfer state, settings, history)
//! - [`recovery`] - startup inspection of leftover transfer state

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod persist;
pub mod recovery;
pub mod transfer;

// Re-export commonly used types
pub use persist::{Settings, StateStore, StateStoreError, TransferState, UrlHistory};
pub use recovery::{RecoveryDecision, RecoveryPrompt, check_for_recovery};
pub use transfer::{
    DownloadEngine, EngineConfig, EngineError, NullObserver, ProgressUpdate, RunState,
    TransferError, TransferObserver, format_bytes, percentage,
};
