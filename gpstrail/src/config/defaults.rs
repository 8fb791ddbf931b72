//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants, range helpers, and the
//! `ConfigFile::default()` implementation.

use std::path::PathBuf;

use tracing::warn;

use super::settings::*;
use crate::provider::LocationPriority;
use crate::window::EvictionScan;

// =============================================================================
// Tracking
// =============================================================================

/// Default retention window in seconds (5 minutes).
pub const DEFAULT_RETENTION_SECS: u64 = 300;

/// Default provider update interval in milliseconds.
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 2000;

/// Default provider batching delay (no batching).
pub const DEFAULT_MAX_WAIT_MS: u64 = 0;

/// Default capacity of the provider event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 16;

// =============================================================================
// Storage
// =============================================================================

/// Default persistence writer queue capacity.
pub const DEFAULT_WRITER_QUEUE_SIZE: usize = crate::store::DEFAULT_WRITER_QUEUE;

/// Minimum persistence writer queue capacity.
pub const MIN_WRITER_QUEUE_SIZE: usize = 1;

/// Maximum persistence writer queue capacity.
pub const MAX_WRITER_QUEUE_SIZE: usize = 65_536;

/// Default database file name.
pub const DEFAULT_DATABASE_FILE: &str = "locations.db";

/// Default database path: `<local data dir>/gpstrail/locations.db`.
///
/// Falls back to `./gpstrail/locations.db` when the platform has no data
/// directory.
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gpstrail")
        .join(DEFAULT_DATABASE_FILE)
}

/// Clamps the writer queue to its valid range and logs a warning if clamped.
pub(super) fn clamp_writer_queue(value: usize) -> usize {
    if value < MIN_WRITER_QUEUE_SIZE {
        warn!(
            requested = value,
            min = MIN_WRITER_QUEUE_SIZE,
            max = MAX_WRITER_QUEUE_SIZE,
            "writer_queue below minimum, clamping to {}",
            MIN_WRITER_QUEUE_SIZE
        );
        MIN_WRITER_QUEUE_SIZE
    } else if value > MAX_WRITER_QUEUE_SIZE {
        warn!(
            requested = value,
            min = MIN_WRITER_QUEUE_SIZE,
            max = MAX_WRITER_QUEUE_SIZE,
            "writer_queue above maximum, clamping to {}",
            MAX_WRITER_QUEUE_SIZE
        );
        MAX_WRITER_QUEUE_SIZE
    } else {
        value
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Default log directory.
pub const DEFAULT_LOG_DIRECTORY: &str = "logs";

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "gpstrail.log";

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            tracking: TrackingSettings {
                retention_secs: DEFAULT_RETENTION_SECS,
                update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
                priority: LocationPriority::HighAccuracy,
                max_wait_ms: DEFAULT_MAX_WAIT_MS,
                eviction: EvictionScan::StopAtFirstFresh,
                event_buffer: DEFAULT_EVENT_BUFFER,
            },
            storage: StorageSettings {
                database: default_database_path(),
                writer_queue: DEFAULT_WRITER_QUEUE_SIZE,
            },
            logging: LoggingSettings {
                directory: PathBuf::from(DEFAULT_LOG_DIRECTORY),
                file: DEFAULT_LOG_FILE.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_writer_queue() {
        assert_eq!(clamp_writer_queue(0), MIN_WRITER_QUEUE_SIZE);
        assert_eq!(clamp_writer_queue(512), 512);
        assert_eq!(clamp_writer_queue(1_000_000), MAX_WRITER_QUEUE_SIZE);
    }

    #[test]
    fn test_default_database_path_layout() {
        let path = default_database_path();
        assert!(path.ends_with("gpstrail/locations.db"));
    }

    #[test]
    fn test_defaults_match_tracking_constants() {
        let config = ConfigFile::default();
        assert_eq!(
            std::time::Duration::from_secs(config.tracking.retention_secs),
            crate::window::DEFAULT_TTL
        );
        assert_eq!(
            std::time::Duration::from_millis(config.tracking.update_interval_ms),
            crate::provider::DEFAULT_UPDATE_INTERVAL
        );
    }
}
