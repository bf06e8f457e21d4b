//! Constants for the transfer module (staging naming, timeouts, cadence).

use std::time::Duration;

/// Suffix appended to the final file name while bytes are still arriving.
pub const STAGING_SUFFIX: &str = ".tmpdownload";

/// Size of a single read from the response body (8 KiB).
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Poll interval for the pause flag inside the copy loop.
pub const PAUSE_POLL: Duration = Duration::from_millis(100);

/// Checkpoint when this much time has passed since the last one.
pub const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(5);

/// Checkpoint when this many bytes have arrived since the last one (1 MiB).
pub const CHECKPOINT_BYTES: u64 = 1024 * 1024;

/// Minimum sampling window for the transfer speed estimate.
pub const SPEED_WINDOW: Duration = Duration::from_secs(1);

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Per-request timeout bounding an unresponsive connection (30 minutes).
///
/// There is deliberately no overall transfer timeout; large files may take
/// arbitrarily long as long as the connection keeps making progress.
pub const REQUEST_TIMEOUT_SECS: u64 = 30 * 60;
