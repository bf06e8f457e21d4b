//! Crash recovery: startup inspection of leftover transfer state.
//!
//! Runs once when the process starts. A recoverable situation is a persisted
//! [`TransferState`] whose staging file still exists on disk; the caller's
//! prompt then decides between resuming in place and discarding. Everything
//! else (no record, missing staging file, unreadable record) takes the
//! cleanup path so no stale checkpoint survives without a matching file.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::persist::TransferState;
use crate::transfer::DownloadEngine;

/// Decides whether a recovered transfer should be resumed.
///
/// Implemented by the caller; the CLI asks on stdin, tests answer directly.
#[async_trait]
pub trait RecoveryPrompt: Send + Sync {
    /// Returns `true` to resume the recorded transfer, `false` to discard it.
    async fn confirm_resume(&self, state: &TransferState) -> bool;
}

/// Outcome of the startup recovery check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryDecision {
    /// The recorded transfer was handed back to the engine.
    Resumed,
    /// Stale state was cleaned up (by choice or because it was unusable).
    Discarded,
    /// The state slot was empty.
    NothingToRecover,
}

/// Inspects the engine's state store for an interrupted transfer.
///
/// On resume the engine re-enters the transfer protocol with the recorded
/// URL and staging path; the protocol rediscovers the partial file and
/// issues the byte-range request by itself.
pub async fn check_for_recovery(
    engine: &DownloadEngine,
    prompt: &dyn RecoveryPrompt,
) -> RecoveryDecision {
    let state = match engine.store().load().await {
        Ok(Some(state)) => state,
        Ok(None) => return RecoveryDecision::NothingToRecover,
        Err(error) => {
            // An unreadable record is "nothing to recover", not a failure
            warn!(error = %error, "transfer state unreadable, discarding");
            discard(engine, None).await;
            return RecoveryDecision::Discarded;
        }
    };

    let staging_exists = tokio::fs::try_exists(&state.file_path).await.unwrap_or(false);
    if !staging_exists {
        info!(
            path = %state.file_path.display(),
            "recorded staging file is gone, discarding stale state"
        );
        discard(engine, Some(&state)).await;
        return RecoveryDecision::Discarded;
    }

    if prompt.confirm_resume(&state).await {
        match engine.resume_transfer(state) {
            Ok(()) => RecoveryDecision::Resumed,
            Err(error) => {
                warn!(error = %error, "could not resume recovered transfer");
                RecoveryDecision::Discarded
            }
        }
    } else {
        discard(engine, Some(&state)).await;
        RecoveryDecision::Discarded
    }
}

/// Best-effort cleanup of a stale record and its staging file.
async fn discard(engine: &DownloadEngine, state: Option<&TransferState>) {
    if let Some(state) = state
        && let Err(error) = tokio::fs::remove_file(&state.file_path).await
        && error.kind() != std::io::ErrorKind::NotFound
    {
        debug!(
            path = %state.file_path.display(),
            error = %error,
            "failed to remove orphaned staging file"
        );
    }
    if let Err(error) = engine.store().clear().await {
        debug!(error = %error, "failed to clear stale transfer state");
    }
}
