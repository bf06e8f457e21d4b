//! CLI entry point for the dlm download manager.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use dlm_core::persist::{HISTORY_FILE, SETTINGS_FILE, STATE_FILE};
use dlm_core::{
    DownloadEngine, EngineConfig, ProgressUpdate, RecoveryDecision, RecoveryPrompt, Settings,
    StateStore, TransferObserver, TransferState, UrlHistory, check_for_recovery, format_bytes,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let data_dir = resolve_data_dir(args.data_dir.clone());
    std::fs::create_dir_all(&data_dir)?;

    let settings = Settings::load(&data_dir.join(SETTINGS_FILE)).await;
    let download_dir = match args.output_dir.clone() {
        Some(dir) => {
            // An explicit directory becomes the new default, the way the
            // original folder picker persisted its choice
            let updated = Settings {
                download_directory: dir.clone(),
            };
            if let Err(error) = updated.save(&data_dir.join(SETTINGS_FILE)).await {
                warn!(error = %error, "failed to persist settings");
            }
            dir
        }
        None => settings.download_directory.clone(),
    };

    let store = StateStore::new(data_dir.join(STATE_FILE));
    let history = UrlHistory::load(data_dir.join(HISTORY_FILE)).await;
    let observer = Arc::new(ConsoleObserver::new());

    let engine = DownloadEngine::new(EngineConfig::default(), store, history, observer)?;

    // Offer to pick up an interrupted download before anything else
    let prompt = ConsolePrompt {
        assume_yes: args.assume_yes,
    };
    let decision = check_for_recovery(&engine, &prompt).await;

    match decision {
        RecoveryDecision::Resumed => {
            if args.url.is_some() {
                warn!("resuming the previous download; the URL argument is ignored");
            }
        }
        RecoveryDecision::Discarded | RecoveryDecision::NothingToRecover => {
            let Some(url) = args.url.as_deref() else {
                println!("Nothing to do. Pass a URL to download, e.g. dlm https://example.com/file.zip");
                return Ok(());
            };
            engine.start(url, &download_dir)?;
        }
    }

    // Ctrl-C saves a checkpoint and exits instead of throwing work away
    {
        let engine = engine.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, saving checkpoint");
                let _ = engine.shutdown();
            }
        });
    }

    engine.wait().await;
    Ok(())
}

/// Data directory for the state/settings/history documents.
fn resolve_data_dir(override_dir: Option<PathBuf>) -> PathBuf {
    override_dir
        .or_else(|| dirs::config_dir().map(|dir| dir.join("dlm")))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Terminal renderer for engine callbacks, built on an indicatif bar.
struct ConsoleObserver {
    bar: ProgressBar,
}

impl ConsoleObserver {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }
}

impl TransferObserver for ConsoleObserver {
    fn on_progress(&self, update: &ProgressUpdate) {
        if update.total_bytes > 0 {
            if self.bar.length() != Some(update.total_bytes) {
                self.bar.set_length(update.total_bytes);
            }
            self.bar.set_position(update.transferred_bytes);
            self.bar.set_message(format!(
                "{}% ({} of {}) {}",
                update.percent.unwrap_or(0),
                format_bytes(update.transferred_bytes),
                format_bytes(update.total_bytes),
                update.speed
            ));
        } else {
            self.bar.set_message(format!(
                "{} {}",
                format_bytes(update.transferred_bytes),
                update.speed
            ));
        }
    }

    fn on_status(&self, status: &str) {
        self.bar.println(status);
    }

    fn on_completed(&self, _path: &Path) {
        self.bar.finish_and_clear();
    }
}

/// Stdin-backed recovery prompt; `-y` answers yes without asking.
struct ConsolePrompt {
    assume_yes: bool,
}

#[async_trait]
impl RecoveryPrompt for ConsolePrompt {
    async fn confirm_resume(&self, state: &TransferState) -> bool {
        println!(
            "An unfinished download was found: {} ({} of {})",
            state.url,
            format_bytes(state.downloaded_bytes),
            if state.total_bytes > 0 {
                format_bytes(state.total_bytes)
            } else {
                "unknown size".to_string()
            }
        );

        if self.assume_yes {
            println!("Resuming it (--assume-yes).");
            return true;
        }

        print!("Resume it? [y/N] ");
        let _ = std::io::stdout().flush();

        let answer = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => {
                let line = line.trim();
                line.eq_ignore_ascii_case("y") || line.eq_ignore_ascii_case("yes")
            }
            _ => false,
        }
    }
}
