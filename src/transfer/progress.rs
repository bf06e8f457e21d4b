//! Progress reporting: byte formatting, percentage arithmetic, speed
//! estimation, and the observer trait the engine reports through.

use std::path::Path;
use std::time::Instant;

use super::constants::SPEED_WINDOW;

/// Unit symbols for binary (1024-based) byte formatting.
const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Formats a byte count using binary units with up to two decimal places.
///
/// The unit escalates while the value is >= 1024 and a larger unit remains:
/// `1023` stays in bytes, `1024` becomes `"1 KB"`, `1536` becomes `"1.5 KB"`.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        return format!("{bytes} B");
    }
    let rendered = format!("{value:.2}");
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{rendered} {}", UNITS[unit])
}

/// Progress percentage: `clamp(floor(transferred * 100 / total), 0, 100)`.
///
/// Only meaningful when `total > 0`; a zero total yields 0 rather than
/// dividing by zero.
#[must_use]
pub fn percentage(transferred: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (u128::from(transferred) * 100) / u128::from(total);
    u8::try_from(pct.min(100)).unwrap_or(100)
}

/// A single progress report emitted by the copy loop.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Completion percentage; `None` when the server did not report a length.
    pub percent: Option<u8>,
    /// Bytes durably written to the staging file so far.
    pub transferred_bytes: u64,
    /// Declared content length, `0` when unknown.
    pub total_bytes: u64,
    /// Formatted transfer speed, e.g. `"1.2 MB/s"`.
    pub speed: String,
}

/// Callback surface owned by the caller.
///
/// All methods are fire-and-forget: the engine never waits on an observer and
/// ignores whatever it does. Implementations must not block for long since
/// they run on the transfer task between chunk reads.
pub trait TransferObserver: Send + Sync {
    /// Called after each chunk with the current byte counts and speed.
    fn on_progress(&self, update: &ProgressUpdate);

    /// Called on phase changes with a human-readable description.
    fn on_status(&self, status: &str);

    /// Called once after the staging file has been promoted to its final name.
    fn on_completed(&self, path: &Path);
}

/// Observer that discards every report. Useful for tests and headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl TransferObserver for NullObserver {
    fn on_progress(&self, _update: &ProgressUpdate) {}
    fn on_status(&self, _status: &str) {}
    fn on_completed(&self, _path: &Path) {}
}

/// Rolling transfer-speed estimate over >= 1 second sampling windows.
///
/// Between samples the previous estimate is reported unchanged, so the text
/// is stable even though the loop calls [`SpeedEstimator::sample`] per chunk.
#[derive(Debug)]
pub struct SpeedEstimator {
    window_start: Instant,
    bytes_at_window: u64,
    text: String,
}

impl SpeedEstimator {
    /// Starts a fresh estimate at the given byte position.
    #[must_use]
    pub fn new(initial_bytes: u64) -> Self {
        Self {
            window_start: Instant::now(),
            bytes_at_window: initial_bytes,
            text: "0 B/s".to_string(),
        }
    }

    /// Records the current position and returns the formatted estimate.
    pub fn sample(&mut self, now: Instant, transferred: u64) -> &str {
        let elapsed = now.duration_since(self.window_start);
        if elapsed >= SPEED_WINDOW {
            let delta = transferred.saturating_sub(self.bytes_at_window);
            let per_second = (delta as f64 / elapsed.as_secs_f64()) as u64;
            self.text = format!("{}/s", format_bytes(per_second));
            self.window_start = now;
            self.bytes_at_window = transferred;
        }
        &self.text
    }

    /// Returns the last computed estimate without sampling.
    #[must_use]
    pub fn current(&self) -> &str {
        &self.text
    }
}
