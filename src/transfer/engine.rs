//! The download engine: a single-transfer state machine.
//!
//! One engine drives at most one transfer at a time. The transfer protocol
//! runs on a dedicated tokio task; the caller-facing control surface
//! (`pause`/`resume`/`cancel`/`shutdown`) only flips flags and cancellation
//! tokens that the copy loop observes between chunk reads, so control calls
//! never block and never touch the staging file handle directly.
//!
//! # Transfer protocol
//!
//! 1. Headers-only GET to classify the content (fresh starts reject HTML).
//! 2. Headers-only GET for content length and disposition metadata.
//! 3. If a nonzero staging file exists, request `Range: bytes=<len>-` and
//!    append; otherwise stream from zero.
//! 4. Copy loop: 8 KiB reads, flush per chunk, checkpoint every 5 s or 1 MiB.
//! 5. On exhaustion: promote the staging file to its final name and clear the
//!    checkpoint.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::TryStreamExt;
use reqwest::header::{CONTENT_TYPE, RANGE};
use reqwest::{Client, Response};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::constants::{
    CHECKPOINT_BYTES, CHECKPOINT_INTERVAL, CHUNK_SIZE, CONNECT_TIMEOUT_SECS, PAUSE_POLL,
    REQUEST_TIMEOUT_SECS,
};
use super::error::TransferError;
use super::filename;
use super::progress::{ProgressUpdate, SpeedEstimator, TransferObserver, format_bytes, percentage};
use crate::persist::{StateStore, TransferState, UrlHistory};

/// Errors from the engine's control surface.
///
/// These are immediate rejections; none of them change the run-state.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The URL was empty or whitespace.
    #[error("no URL provided")]
    EmptyUrl,

    /// A transfer is already active; the engine handles one at a time.
    #[error("a transfer is already active")]
    AlreadyActive,

    /// Pause is only valid while downloading.
    #[error("no download is in progress")]
    NotDownloading,

    /// Resume is only valid while paused.
    #[error("the download is not paused")]
    NotPaused,

    /// Cancel and shutdown require an active transfer.
    #[error("no active transfer")]
    NotActive,

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// The engine's current phase. In-memory only, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No transfer in flight.
    Idle,
    /// The copy loop is streaming bytes.
    Downloading,
    /// The copy loop is parked on the pause flag.
    Paused,
    /// Cancellation signalled, cleanup pending.
    Cancelling,
}

/// Tunable knobs for the engine. The defaults match the shipped behavior;
/// tests shrink the checkpoint cadence to observe intermediate writes.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// HTTP connect timeout.
    pub connect_timeout: Duration,
    /// Per-request timeout bounding an unresponsive connection.
    pub request_timeout: Duration,
    /// Size of a single read from the response body.
    pub chunk_size: usize,
    /// Poll interval for the pause flag.
    pub pause_poll: Duration,
    /// Checkpoint after this much time since the last one.
    pub checkpoint_interval: Duration,
    /// Checkpoint after this many bytes since the last one.
    pub checkpoint_bytes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            chunk_size: CHUNK_SIZE,
            pause_poll: PAUSE_POLL,
            checkpoint_interval: CHECKPOINT_INTERVAL,
            checkpoint_bytes: CHECKPOINT_BYTES,
        }
    }
}

/// Signals shared between the control surface and the copy loop.
#[derive(Debug, Default)]
struct TransferControls {
    paused: AtomicBool,
    cancel: CancellationToken,
    shutdown: CancellationToken,
}

struct ActiveTransfer {
    controls: Arc<TransferControls>,
    handle: Option<JoinHandle<()>>,
}

/// Everything needed to run one transfer attempt.
#[derive(Debug)]
struct TransferPlan {
    url: String,
    directory: PathBuf,
    /// Present when resuming a recorded transfer after recovery.
    resume: Option<TransferState>,
}

enum TransferOutcome {
    /// The staging file was promoted to this final path.
    Completed(PathBuf),
    /// Graceful shutdown; staging file and checkpoint retained.
    Suspended,
}

enum Fetched {
    Response(Response),
    Interrupted,
}

struct EngineInner {
    client: Client,
    config: EngineConfig,
    store: StateStore,
    history: AsyncMutex<UrlHistory>,
    observer: Arc<dyn TransferObserver>,
    run_state: Mutex<RunState>,
    active: Mutex<Option<ActiveTransfer>>,
}

/// Resumable single-file download engine.
///
/// Cheap to clone; clones share the same engine state. See the module docs
/// for the transfer protocol and concurrency model.
#[derive(Clone)]
pub struct DownloadEngine {
    inner: Arc<EngineInner>,
}

impl fmt::Debug for DownloadEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadEngine")
            .field("run_state", &self.run_state())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DownloadEngine {
    /// Creates an engine around a state store, history, and observer.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Http`] when the HTTP client cannot be built.
    pub fn new(
        config: EngineConfig,
        store: StateStore,
        history: UrlHistory,
        observer: Arc<dyn TransferObserver>,
    ) -> Result<Self, EngineError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(concat!("dlm/", env!("CARGO_PKG_VERSION")))
            .build()?;

        debug!(
            connect_timeout_secs = config.connect_timeout.as_secs(),
            request_timeout_secs = config.request_timeout.as_secs(),
            "creating download engine"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                client,
                config,
                store,
                history: AsyncMutex::new(history),
                observer,
                run_state: Mutex::new(RunState::Idle),
                active: Mutex::new(None),
            }),
        })
    }

    /// Returns the engine's current run-state.
    #[must_use]
    pub fn run_state(&self) -> RunState {
        *lock(&self.inner.run_state)
    }

    /// Returns the state store backing this engine.
    #[must_use]
    pub fn store(&self) -> &StateStore {
        &self.inner.store
    }

    /// Starts a fresh transfer of `url` into `destination`.
    ///
    /// Validation is synchronous; the transfer itself runs on a dedicated
    /// task, so this returns as soon as the task is spawned.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyUrl`] for a blank URL and
    /// [`EngineError::AlreadyActive`] when a transfer is in flight. Neither
    /// changes the run-state.
    pub fn start(&self, url: &str, destination: &Path) -> Result<(), EngineError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(EngineError::EmptyUrl);
        }
        info!(url, directory = %destination.display(), "starting download");
        self.begin(TransferPlan {
            url: url.to_string(),
            directory: destination.to_path_buf(),
            resume: None,
        })
    }

    /// Resumes a transfer recorded in a recovered [`TransferState`].
    ///
    /// The protocol rediscovers the partial staging file on disk and enters
    /// range-resume mode by itself; the record only seeds the URL, the
    /// staging path, and the total-bytes hint.
    ///
    /// # Errors
    ///
    /// Same rejections as [`start`](Self::start).
    pub fn resume_transfer(&self, recorded: TransferState) -> Result<(), EngineError> {
        if recorded.url.trim().is_empty() {
            return Err(EngineError::EmptyUrl);
        }
        let directory = recorded
            .file_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        info!(
            url = %recorded.url,
            offset = recorded.downloaded_bytes,
            "resuming recorded download"
        );
        self.begin(TransferPlan {
            url: recorded.url.clone(),
            directory,
            resume: Some(recorded),
        })
    }

    fn begin(&self, plan: TransferPlan) -> Result<(), EngineError> {
        {
            let mut run_state = lock(&self.inner.run_state);
            if *run_state != RunState::Idle {
                return Err(EngineError::AlreadyActive);
            }
            *run_state = RunState::Downloading;
        }

        let controls = Arc::new(TransferControls::default());
        let engine = self.clone();
        let task_controls = Arc::clone(&controls);
        let handle = tokio::spawn(async move { engine.run_transfer(plan, task_controls).await });
        *lock(&self.inner.active) = Some(ActiveTransfer {
            controls,
            handle: Some(handle),
        });
        Ok(())
    }

    /// Pauses the active transfer.
    ///
    /// The copy loop parks before its next read; the network stream and file
    /// handle stay open so the transfer can continue in place.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotDownloading`] unless currently downloading.
    pub fn pause(&self) -> Result<(), EngineError> {
        {
            let mut run_state = lock(&self.inner.run_state);
            if *run_state != RunState::Downloading {
                return Err(EngineError::NotDownloading);
            }
            *run_state = RunState::Paused;
        }
        let active = lock(&self.inner.active);
        let Some(active) = active.as_ref() else {
            return Err(EngineError::NotActive);
        };
        active.controls.paused.store(true, Ordering::Relaxed);
        debug!("download paused");
        Ok(())
    }

    /// Resumes a paused transfer in place.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotPaused`] unless currently paused.
    pub fn resume(&self) -> Result<(), EngineError> {
        {
            let mut run_state = lock(&self.inner.run_state);
            if *run_state != RunState::Paused {
                return Err(EngineError::NotPaused);
            }
            *run_state = RunState::Downloading;
        }
        let active = lock(&self.inner.active);
        let Some(active) = active.as_ref() else {
            return Err(EngineError::NotActive);
        };
        active.controls.paused.store(false, Ordering::Relaxed);
        debug!("download resumed");
        Ok(())
    }

    /// Cancels the active transfer.
    ///
    /// The signal interrupts the in-flight read and any pause-wait; the loop
    /// then deletes the staging file, clears the checkpoint, and returns the
    /// engine to `Idle`. Cleanup always completes, even when individual
    /// steps fail.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotActive`] unless downloading or paused.
    pub fn cancel(&self) -> Result<(), EngineError> {
        {
            let mut run_state = lock(&self.inner.run_state);
            if !matches!(*run_state, RunState::Downloading | RunState::Paused) {
                return Err(EngineError::NotActive);
            }
            *run_state = RunState::Cancelling;
        }
        let active = lock(&self.inner.active);
        let Some(active) = active.as_ref() else {
            return Err(EngineError::NotActive);
        };
        active.controls.cancel.cancel();
        info!("download cancel requested");
        Ok(())
    }

    /// Requests a graceful shutdown of the active transfer.
    ///
    /// Unlike [`cancel`](Self::cancel) this writes one final checkpoint and
    /// keeps both the staging file and the state record, so the next process
    /// start can offer to resume.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotActive`] unless downloading or paused.
    pub fn shutdown(&self) -> Result<(), EngineError> {
        {
            let run_state = lock(&self.inner.run_state);
            if !matches!(*run_state, RunState::Downloading | RunState::Paused) {
                return Err(EngineError::NotActive);
            }
        }
        let active = lock(&self.inner.active);
        let Some(active) = active.as_ref() else {
            return Err(EngineError::NotActive);
        };
        active.controls.shutdown.cancel();
        info!("graceful shutdown requested, checkpoint will be retained");
        Ok(())
    }

    /// Waits for the active transfer task to finish.
    pub async fn wait(&self) {
        let handle = lock(&self.inner.active)
            .as_mut()
            .and_then(|active| active.handle.take());
        if let Some(handle) = handle
            && let Err(error) = handle.await
        {
            warn!(error = %error, "transfer task panicked");
        }
    }

    /// Top of the transfer task: runs the protocol, then maps the outcome
    /// onto cleanup and status reporting. Never propagates an error.
    async fn run_transfer(self, plan: TransferPlan, controls: Arc<TransferControls>) {
        let mut staging = plan
            .resume
            .as_ref()
            .map(|recorded| recorded.file_path.clone());
        let result = self.execute_transfer(&plan, &controls, &mut staging).await;

        match result {
            Ok(TransferOutcome::Completed(final_path)) => {
                info!(path = %final_path.display(), "download complete");
                self.inner
                    .observer
                    .on_status(&format!("File saved: {}", final_path.display()));
                self.inner.observer.on_completed(&final_path);
            }
            Ok(TransferOutcome::Suspended) => {
                self.inner
                    .observer
                    .on_status("Download interrupted; it can be resumed on the next start");
            }
            Err(TransferError::Cancelled) => {
                self.teardown(staging.as_deref()).await;
                info!(url = %plan.url, "download cancelled");
                self.inner.observer.on_status("Download cancelled");
            }
            Err(error @ TransferError::NotAFile { .. }) => {
                warn!(url = %plan.url, error = %error, "rejected link classified as a web page");
                self.inner
                    .observer
                    .on_status("The link leads to a web page, not a direct file link");
            }
            Err(error) => {
                self.teardown(staging.as_deref()).await;
                warn!(url = %plan.url, error = %error, "download failed");
                self.inner
                    .observer
                    .on_status(&format!("Download failed: {error}"));
            }
        }

        *lock(&self.inner.run_state) = RunState::Idle;
    }

    /// Best-effort removal of the staging file and the checkpoint.
    async fn teardown(&self, staging: Option<&Path>) {
        if let Some(path) = staging
            && let Err(error) = tokio::fs::remove_file(path).await
            && error.kind() != std::io::ErrorKind::NotFound
        {
            debug!(path = %path.display(), error = %error, "failed to remove staging file");
        }
        if let Err(error) = self.inner.store.clear().await {
            debug!(error = %error, "failed to clear transfer state");
        }
    }

    /// The transfer protocol proper. `staging_slot` is filled in as soon as
    /// the staging path is known so the caller can clean up on any error.
    async fn execute_transfer(
        &self,
        plan: &TransferPlan,
        controls: &TransferControls,
        staging_slot: &mut Option<PathBuf>,
    ) -> Result<TransferOutcome, TransferError> {
        let url = plan.url.as_str();
        let parsed_url = Url::parse(url).map_err(|_| TransferError::invalid_url(url))?;

        if plan.resume.is_none() {
            self.inner.observer.on_status("Checking link...");
            let probe = match self.send_get(url, None, controls).await? {
                Fetched::Response(response) => response,
                Fetched::Interrupted => return Ok(TransferOutcome::Suspended),
            };
            if let Some(media_type) = declared_media_type(&probe)
                && media_type == "text/html"
            {
                return Err(TransferError::not_a_file(url, media_type));
            }
            // Headers-only read; the body is never pulled
            drop(probe);

            self.inner.history.lock().await.record(url).await;
            self.inner.observer.on_status("Starting download...");
        } else {
            self.inner.observer.on_status("Resuming download...");
        }

        tokio::fs::create_dir_all(&plan.directory)
            .await
            .map_err(|error| TransferError::io(&plan.directory, error))?;

        // Headers-only metadata request: content length and disposition
        let metadata = match self.send_get(url, None, controls).await? {
            Fetched::Response(response) => response,
            Fetched::Interrupted => return Ok(TransferOutcome::Suspended),
        };

        let staging_path = match &plan.resume {
            Some(recorded) => recorded.file_path.clone(),
            None => {
                let name = filename::derive_name(&parsed_url, metadata.headers());
                let final_path = filename::unique_path(&plan.directory, &name);
                filename::staging_path_for(&final_path)
            }
        };
        *staging_slot = Some(staging_path.clone());

        let declared_total = metadata.content_length().unwrap_or(0);
        drop(metadata);

        // The content length from the plain metadata request is the full
        // resource size; the recorded total only fills in when the server
        // stopped reporting one.
        let total_bytes = if declared_total > 0 {
            declared_total
        } else {
            plan.resume
                .as_ref()
                .map_or(0, |recorded| recorded.total_bytes)
        };

        let existing_bytes = tokio::fs::metadata(&staging_path)
            .await
            .map(|meta| meta.len())
            .unwrap_or(0);
        let range = (existing_bytes > 0).then(|| format!("bytes={existing_bytes}-"));

        let response = match self.send_get(url, range.as_deref(), controls).await? {
            Fetched::Response(response) => response,
            Fetched::Interrupted => return Ok(TransferOutcome::Suspended),
        };

        // Only a 206 proves the server honored the offset. Anything else
        // would append a full body after the partial data, so start over.
        let resuming = range.is_some() && response.status().as_u16() == 206;
        let mut transferred = if resuming { existing_bytes } else { 0 };
        if resuming {
            info!(url, offset = existing_bytes, "entering range-resume mode");
        } else if range.is_some() {
            warn!(url, "server ignored the range request, restarting from zero");
        }

        let mut file = open_staging(&staging_path, resuming).await?;

        let mut state = TransferState::new(url, &staging_path, total_bytes, transferred);
        self.inner.store.save(&state).await?;

        let mut speed = SpeedEstimator::new(transferred);
        let mut checkpointer = Checkpointer::new(
            Instant::now(),
            transferred,
            self.inner.config.checkpoint_interval,
            self.inner.config.checkpoint_bytes,
        );
        self.report_progress(transferred, total_bytes, speed.current());

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let mut reader = StreamReader::new(stream);
        let mut buffer = vec![0u8; self.inner.config.chunk_size];

        loop {
            // Pause-wait: no further reads are issued until resumed, so no
            // bytes are consumed from the network beyond what is buffered
            if controls.paused.load(Ordering::Relaxed) {
                self.report_paused(transferred, total_bytes);
                while controls.paused.load(Ordering::Relaxed) {
                    tokio::select! {
                        () = controls.cancel.cancelled() => return Err(TransferError::Cancelled),
                        () = controls.shutdown.cancelled() => {
                            self.suspend(&mut file, &staging_path, &mut state, transferred).await?;
                            return Ok(TransferOutcome::Suspended);
                        }
                        () = tokio::time::sleep(self.inner.config.pause_poll) => {}
                    }
                }
                self.inner.observer.on_status("Resuming download...");
            }

            // Cancellation is observed here, between chunks, so no write is
            // ever torn mid-flight
            if controls.cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }
            if controls.shutdown.is_cancelled() {
                self.suspend(&mut file, &staging_path, &mut state, transferred).await?;
                return Ok(TransferOutcome::Suspended);
            }
            let read = tokio::select! {
                () = controls.cancel.cancelled() => return Err(TransferError::Cancelled),
                () = controls.shutdown.cancelled() => {
                    self.suspend(&mut file, &staging_path, &mut state, transferred).await?;
                    return Ok(TransferOutcome::Suspended);
                }
                read = reader.read(&mut buffer) => read,
            };
            let count = read.map_err(|error| TransferError::stream(url, error))?;
            if count == 0 {
                break;
            }

            file.write_all(&buffer[..count])
                .await
                .map_err(|error| TransferError::io(&staging_path, error))?;
            file.flush()
                .await
                .map_err(|error| TransferError::io(&staging_path, error))?;
            transferred += count as u64;

            let now = Instant::now();
            let speed_text = speed.sample(now, transferred).to_string();
            self.report_progress(transferred, total_bytes, &speed_text);

            if checkpointer.due(now, transferred) {
                // The checkpoint must never claim more bytes than the
                // staging file durably holds
                file.sync_data()
                    .await
                    .map_err(|error| TransferError::io(&staging_path, error))?;
                state.downloaded_bytes = transferred;
                state.recorded_at = Utc::now();
                self.inner.store.save(&state).await?;
                checkpointer.mark(Instant::now(), transferred);
            }
        }

        file.flush()
            .await
            .map_err(|error| TransferError::io(&staging_path, error))?;
        file.sync_data()
            .await
            .map_err(|error| TransferError::io(&staging_path, error))?;
        drop(file);

        let final_path = resolve_final_path(&plan.directory, &staging_path).await;
        if final_path != staging_path {
            tokio::fs::rename(&staging_path, &final_path)
                .await
                .map_err(|error| TransferError::io(&final_path, error))?;
        }

        if let Err(error) = self.inner.store.clear().await {
            warn!(error = %error, "failed to clear transfer state after completion");
        }

        let final_speed = speed.current().to_string();
        self.inner.observer.on_progress(&ProgressUpdate {
            percent: (total_bytes > 0).then_some(100),
            transferred_bytes: transferred,
            total_bytes,
            speed: final_speed,
        });

        Ok(TransferOutcome::Completed(final_path))
    }

    /// Final checkpoint for a graceful shutdown: flush, sync, persist.
    async fn suspend(
        &self,
        file: &mut File,
        staging_path: &Path,
        state: &mut TransferState,
        transferred: u64,
    ) -> Result<(), TransferError> {
        file.flush()
            .await
            .map_err(|error| TransferError::io(staging_path, error))?;
        file.sync_data()
            .await
            .map_err(|error| TransferError::io(staging_path, error))?;
        state.downloaded_bytes = transferred;
        state.recorded_at = Utc::now();
        self.inner.store.save(state).await?;
        info!(
            path = %staging_path.display(),
            bytes = transferred,
            "transfer suspended with checkpoint"
        );
        Ok(())
    }

    /// Issues a GET, optionally with a byte-range header. The send itself is
    /// cancel-aware so a cancel during connection setup is prompt.
    async fn send_get(
        &self,
        url: &str,
        range: Option<&str>,
        controls: &TransferControls,
    ) -> Result<Fetched, TransferError> {
        let mut request = self.inner.client.get(url);
        if let Some(range) = range {
            request = request.header(RANGE, range);
        }

        let response = tokio::select! {
            () = controls.cancel.cancelled() => return Err(TransferError::Cancelled),
            () = controls.shutdown.cancelled() => return Ok(Fetched::Interrupted),
            sent = request.send() => sent.map_err(|error| {
                if error.is_timeout() {
                    TransferError::timeout(url)
                } else {
                    TransferError::network(url, error)
                }
            })?,
        };

        if !response.status().is_success() {
            return Err(TransferError::http_status(url, response.status().as_u16()));
        }
        Ok(Fetched::Response(response))
    }

    fn report_progress(&self, transferred: u64, total: u64, speed: &str) {
        self.inner.observer.on_progress(&ProgressUpdate {
            percent: (total > 0).then(|| percentage(transferred, total)),
            transferred_bytes: transferred,
            total_bytes: total,
            speed: speed.to_string(),
        });
    }

    fn report_paused(&self, transferred: u64, total: u64) {
        let status = if total > 0 {
            format!(
                "Paused at {}% ({} of {})",
                percentage(transferred, total),
                format_bytes(transferred),
                format_bytes(total)
            )
        } else {
            format!("Paused at {}", format_bytes(transferred))
        };
        self.inner.observer.on_status(&status);
    }
}

/// Strips the staging suffix; re-resolves uniqueness when the final name
/// was taken by an unrelated file while the transfer ran.
async fn resolve_final_path(directory: &Path, staging_path: &Path) -> PathBuf {
    let candidate = filename::final_path_for(staging_path);
    if candidate == staging_path {
        return candidate;
    }
    if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        let name = candidate
            .file_name()
            .and_then(std::ffi::OsStr::to_str)
            .map_or_else(|| "download".to_string(), str::to_string);
        return filename::unique_path(directory, &name);
    }
    candidate
}

/// Opens the staging file for writing. Resume mode appends and never
/// truncates; fresh mode starts the file over.
async fn open_staging(path: &Path, resuming: bool) -> Result<File, TransferError> {
    let mut options = OpenOptions::new();
    if resuming {
        options.create(true).append(true);
    } else {
        options.create(true).write(true).truncate(true);
    }
    options
        .open(path)
        .await
        .map_err(|error| TransferError::io(path, error))
}

/// The media type a response declares, lowercased and without parameters.
fn declared_media_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
}

/// Decides when a checkpoint is due: a time threshold or a byte threshold,
/// whichever trips first.
#[derive(Debug)]
struct Checkpointer {
    last_save: Instant,
    last_bytes: u64,
    interval: Duration,
    byte_threshold: u64,
}

impl Checkpointer {
    fn new(now: Instant, bytes: u64, interval: Duration, byte_threshold: u64) -> Self {
        Self {
            last_save: now,
            last_bytes: bytes,
            interval,
            byte_threshold,
        }
    }

    fn due(&self, now: Instant, bytes: u64) -> bool {
        now.duration_since(self.last_save) >= self.interval
            || bytes.saturating_sub(self.last_bytes) >= self.byte_threshold
    }

    fn mark(&mut self, now: Instant, bytes: u64) {
        self.last_save = now;
        self.last_bytes = bytes;
    }
}
