//! Integration tests for the transfer engine.
//!
//! Simple request/response cases run against wiremock; everything that
//! needs a live mid-stream transfer (pause, cancel, checkpoints) runs
//! against the paced streaming server in `support`.

mod support;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dlm_core::persist::{StateStore, UrlHistory};
use dlm_core::{
    DownloadEngine, EngineConfig, EngineError, ProgressUpdate, RunState, TransferObserver,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{PacedServer, expected_body, wait_until};

/// Observer that records every callback for later assertions.
#[derive(Default)]
struct RecordingObserver {
    statuses: Mutex<Vec<String>>,
    updates: Mutex<Vec<ProgressUpdate>>,
    completed: Mutex<Option<PathBuf>>,
}

impl RecordingObserver {
    fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }

    fn completed(&self) -> Option<PathBuf> {
        self.completed.lock().unwrap().clone()
    }

    fn last_update(&self) -> Option<ProgressUpdate> {
        self.updates.lock().unwrap().last().cloned()
    }
}

impl TransferObserver for RecordingObserver {
    fn on_progress(&self, update: &ProgressUpdate) {
        self.updates.lock().unwrap().push(update.clone());
    }

    fn on_status(&self, status: &str) {
        self.statuses.lock().unwrap().push(status.to_string());
    }

    fn on_completed(&self, path: &Path) {
        *self.completed.lock().unwrap() = Some(path.to_path_buf());
    }
}

struct Harness {
    engine: DownloadEngine,
    observer: Arc<RecordingObserver>,
    download_dir: PathBuf,
    state_path: PathBuf,
    _temp_dir: TempDir,
}

fn harness() -> Harness {
    harness_with_config(EngineConfig::default())
}

fn harness_with_config(config: EngineConfig) -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let download_dir = temp_dir.path().join("downloads");
    let state_path = temp_dir.path().join("download_state.json");
    let observer = Arc::new(RecordingObserver::default());
    let engine = DownloadEngine::new(
        config,
        StateStore::new(&state_path),
        UrlHistory::empty(temp_dir.path().join("history.json")),
        Arc::clone(&observer) as Arc<dyn TransferObserver>,
    )
    .unwrap();
    Harness {
        engine,
        observer,
        download_dir,
        state_path,
        _temp_dir: temp_dir,
    }
}

/// Leftover `.tmpdownload` files in a directory.
fn staging_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.to_string_lossy().ends_with(".tmpdownload"))
        .collect()
}

#[tokio::test]
async fn test_download_completes_and_promotes_staging_file() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/report.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/pdf")
                .set_body_bytes(b"pdf contents".to_vec()),
        )
        .mount(&mock_server)
        .await;

    let harness = harness();
    let url = format!("{}/files/report.pdf", mock_server.uri());
    harness.engine.start(&url, &harness.download_dir).unwrap();
    harness.engine.wait().await;

    let final_path = harness.download_dir.join("report.pdf");
    assert_eq!(std::fs::read(&final_path).unwrap(), b"pdf contents");
    assert!(
        staging_files(&harness.download_dir).is_empty(),
        "no .tmpdownload file may remain after completion"
    );
    assert!(!harness.state_path.exists(), "checkpoint must be cleared");
    assert_eq!(harness.engine.run_state(), RunState::Idle);
    assert_eq!(harness.observer.completed(), Some(final_path));

    let last = harness.observer.last_update().unwrap();
    assert_eq!(last.percent, Some(100));
}

#[tokio::test]
async fn test_download_uses_content_disposition_filename() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/pdf")
                .insert_header(
                    "Content-Disposition",
                    r#"attachment; filename="important-paper.pdf""#,
                )
                .set_body_bytes(b"PDF bytes".to_vec()),
        )
        .mount(&mock_server)
        .await;

    let harness = harness();
    let url = format!("{}/api/download", mock_server.uri());
    harness.engine.start(&url, &harness.download_dir).unwrap();
    harness.engine.wait().await;

    assert!(harness.download_dir.join("important-paper.pdf").exists());
}

#[tokio::test]
async fn test_html_page_is_rejected_before_any_write() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/watch"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(
                    "<html><body>not a file</body></html>",
                    "text/html; charset=utf-8",
                ),
        )
        .mount(&mock_server)
        .await;

    let harness = harness();
    let url = format!("{}/watch", mock_server.uri());
    harness.engine.start(&url, &harness.download_dir).unwrap();
    harness.engine.wait().await;

    assert!(
        !harness.download_dir.exists(),
        "classification must reject before any filesystem write"
    );
    assert!(!harness.state_path.exists());
    assert_eq!(harness.engine.run_state(), RunState::Idle);
    assert!(
        harness
            .observer
            .statuses()
            .iter()
            .any(|status| status.contains("not a direct file link")),
        "statuses: {:?}",
        harness.observer.statuses()
    );
}

#[tokio::test]
async fn test_http_error_leaves_no_artifacts() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.zip"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let harness = harness();
    let url = format!("{}/missing.zip", mock_server.uri());
    harness.engine.start(&url, &harness.download_dir).unwrap();
    harness.engine.wait().await;

    assert!(staging_files(&harness.download_dir).is_empty());
    assert!(!harness.state_path.exists());
    assert_eq!(harness.engine.run_state(), RunState::Idle);
    assert!(
        harness
            .observer
            .statuses()
            .iter()
            .any(|status| status.starts_with("Download failed")),
        "statuses: {:?}",
        harness.observer.statuses()
    );
}

#[tokio::test]
async fn test_second_download_of_same_name_gets_numbered_suffix() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/pdf")
                .set_body_bytes(b"contents".to_vec()),
        )
        .mount(&mock_server)
        .await;

    let harness = harness();
    let url = format!("{}/report.pdf", mock_server.uri());

    harness.engine.start(&url, &harness.download_dir).unwrap();
    harness.engine.wait().await;
    harness.engine.start(&url, &harness.download_dir).unwrap();
    harness.engine.wait().await;

    assert!(harness.download_dir.join("report.pdf").exists());
    assert!(
        harness.download_dir.join("report (1).pdf").exists(),
        "second download must not overwrite the first"
    );
}

#[tokio::test]
async fn test_start_while_active_is_rejected() {
    let server = PacedServer::start(100_000, 1_000, Duration::from_millis(10)).await;
    let harness = harness();

    harness
        .engine
        .start(&server.url(), &harness.download_dir)
        .unwrap();
    let second = harness.engine.start(&server.url(), &harness.download_dir);
    assert!(matches!(second, Err(EngineError::AlreadyActive)));

    harness.engine.cancel().unwrap();
    harness.engine.wait().await;
}

#[tokio::test]
async fn test_existing_staging_file_triggers_range_resume() {
    let total = 1000;
    let server = PacedServer::start(total, 100, Duration::ZERO).await;
    let harness = harness();

    // 400 bytes already on disk from an earlier interrupted attempt
    std::fs::create_dir_all(&harness.download_dir).unwrap();
    let staging = harness.download_dir.join("data.bin.tmpdownload");
    std::fs::write(&staging, &expected_body(total)[..400]).unwrap();

    harness
        .engine
        .start(&server.url(), &harness.download_dir)
        .unwrap();
    harness.engine.wait().await;

    assert!(
        server.saw_range_offset(400),
        "expected a bytes=400- request, saw: {:?}",
        server.observed_requests()
    );
    let content = std::fs::read(harness.download_dir.join("data.bin")).unwrap();
    assert_eq!(content.len(), total);
    assert_eq!(content, expected_body(total), "resume must append, not truncate");
    assert!(staging_files(&harness.download_dir).is_empty());
    assert_eq!(harness.engine.run_state(), RunState::Idle);
}

#[tokio::test]
async fn test_cancel_always_leaves_idle_engine_and_no_artifacts() {
    let server = PacedServer::start(100_000, 1_000, Duration::from_millis(10)).await;
    let harness = harness();

    harness
        .engine
        .start(&server.url(), &harness.download_dir)
        .unwrap();

    let download_dir = harness.download_dir.clone();
    assert!(
        wait_until(
            move || !staging_files(&download_dir).is_empty(),
            Duration::from_secs(5)
        )
        .await,
        "staging file never appeared"
    );

    harness.engine.cancel().unwrap();
    harness.engine.wait().await;

    assert_eq!(harness.engine.run_state(), RunState::Idle);
    assert!(staging_files(&harness.download_dir).is_empty());
    assert!(!harness.state_path.exists());
    assert!(
        harness
            .observer
            .statuses()
            .iter()
            .any(|status| status == "Download cancelled"),
        "statuses: {:?}",
        harness.observer.statuses()
    );
}

#[tokio::test]
async fn test_cancel_while_paused_also_cleans_up() {
    let server = PacedServer::start(100_000, 1_000, Duration::from_millis(10)).await;
    let harness = harness();

    harness
        .engine
        .start(&server.url(), &harness.download_dir)
        .unwrap();

    let download_dir = harness.download_dir.clone();
    assert!(
        wait_until(
            move || !staging_files(&download_dir).is_empty(),
            Duration::from_secs(5)
        )
        .await
    );

    harness.engine.pause().unwrap();
    assert_eq!(harness.engine.run_state(), RunState::Paused);

    harness.engine.cancel().unwrap();
    harness.engine.wait().await;

    assert_eq!(harness.engine.run_state(), RunState::Idle);
    assert!(staging_files(&harness.download_dir).is_empty());
    assert!(!harness.state_path.exists());
}

#[tokio::test]
async fn test_pause_stops_the_staging_file_from_growing() {
    let server = PacedServer::start(200_000, 2_000, Duration::from_millis(10)).await;
    let harness = harness();

    harness
        .engine
        .start(&server.url(), &harness.download_dir)
        .unwrap();

    let staging = harness.download_dir.join("data.bin.tmpdownload");
    let staging_probe = staging.clone();
    assert!(
        wait_until(
            move || {
                std::fs::metadata(&staging_probe)
                    .map(|meta| meta.len() > 0)
                    .unwrap_or(false)
            },
            Duration::from_secs(5)
        )
        .await,
        "transfer never produced bytes"
    );

    harness.engine.pause().unwrap();
    assert_eq!(harness.engine.run_state(), RunState::Paused);

    // Allow any in-flight chunk to land, then the size must hold still
    tokio::time::sleep(Duration::from_millis(200)).await;
    let size_at_pause = std::fs::metadata(&staging).unwrap().len();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let size_later = std::fs::metadata(&staging).unwrap().len();
    assert_eq!(
        size_at_pause, size_later,
        "staging file must not grow while paused"
    );

    assert!(
        harness
            .observer
            .statuses()
            .iter()
            .any(|status| status.starts_with("Paused at")),
        "statuses: {:?}",
        harness.observer.statuses()
    );

    harness.engine.resume().unwrap();
    harness.engine.wait().await;

    let content = std::fs::read(harness.download_dir.join("data.bin")).unwrap();
    assert_eq!(content, expected_body(200_000));
    assert_eq!(harness.engine.run_state(), RunState::Idle);
}

#[tokio::test]
async fn test_checkpoints_are_monotonic_and_never_exceed_file_length() {
    let config = EngineConfig {
        checkpoint_interval: Duration::from_millis(50),
        checkpoint_bytes: 8 * 1024,
        ..EngineConfig::default()
    };
    let harness = harness_with_config(config);
    let server = PacedServer::start(300_000, 4_096, Duration::from_millis(5)).await;

    harness
        .engine
        .start(&server.url(), &harness.download_dir)
        .unwrap();

    let store = StateStore::new(&harness.state_path);
    let staging = harness.download_dir.join("data.bin.tmpdownload");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    let mut last_recorded = 0u64;
    let mut observed_checkpoints = 0u32;

    while harness.engine.run_state() != RunState::Idle {
        assert!(
            tokio::time::Instant::now() < deadline,
            "transfer did not finish in time"
        );
        if let Ok(Some(state)) = store.load().await {
            assert!(
                state.downloaded_bytes >= last_recorded,
                "checkpoint regressed: {} < {last_recorded}",
                state.downloaded_bytes
            );
            last_recorded = state.downloaded_bytes;
            // The staging file only grows, so a value persisted earlier can
            // never exceed the length read afterwards
            if let Ok(meta) = std::fs::metadata(&staging) {
                assert!(
                    state.downloaded_bytes <= meta.len(),
                    "checkpoint claims {} bytes but staging file holds {}",
                    state.downloaded_bytes,
                    meta.len()
                );
                observed_checkpoints += 1;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    harness.engine.wait().await;

    assert!(
        observed_checkpoints > 0,
        "never observed a checkpoint during the transfer"
    );
    assert!(!harness.state_path.exists(), "checkpoint must be cleared");
    let content = std::fs::read(harness.download_dir.join("data.bin")).unwrap();
    assert_eq!(content, expected_body(300_000));
}
