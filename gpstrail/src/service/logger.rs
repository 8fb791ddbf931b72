//! Periodic window logging task.
//!
//! Logs the size of the retention window and its newest fix at a fixed
//! interval, at DEBUG level, until cancelled.
//!
//! # Usage
//!
//! ```ignore
//! use gpstrail::service::spawn_window_logger;
//! use tokio_util::sync::CancellationToken;
//!
//! let cancellation = CancellationToken::new();
//! let handle = spawn_window_logger(
//!     window,
//!     cancellation.clone(),
//!     std::time::Duration::from_secs(30),
//! );
//! ```
//!
//! # Output Format
//!
//! - `retained` - fixes currently in the window
//! - `newest` - acquisition time of the newest fix as `HH:MM:SS`
//! - `lat`, `lon` - newest position in decimal degrees
//! - `kind` - `measured` or `placeholder`

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::ingest::SharedWindow;

/// Spawns a background task that periodically logs the window.
///
/// The caller should check `tracing::enabled!(tracing::Level::DEBUG)` before
/// spawning; the task does nothing useful otherwise.
pub fn spawn_window_logger(
    window: SharedWindow,
    cancellation: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    log_window(&window);
                }
                _ = cancellation.cancelled() => {
                    debug!("Window logger stopped");
                    break;
                }
            }
        }
    })
}

fn log_window(window: &SharedWindow) {
    let (retained, newest) = {
        let window = window.read();
        (window.len(), window.newest().cloned())
    };

    match newest {
        Some(fix) => debug!(
            retained,
            newest = %fix.clock_label(),
            lat = format!("{:.5}", fix.latitude),
            lon = format!("{:.5}", fix.longitude),
            kind = %fix.kind,
            "Window status"
        ),
        None => debug!(retained, "Window status (empty)"),
    }
}
