//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[tracking]
; How long a fix is kept in the history, in seconds (default: 300)
retention_secs = {}
; Interval between provider updates in milliseconds (default: 2000)
update_interval_ms = {}
; Accuracy/power trade-off requested from the location provider:
;   high_accuracy - most accurate location available (default)
;   balanced      - block-level accuracy
;   low_power     - city-level accuracy
;   passive       - only locations requested by other applications
priority = {}
; Longest time the provider may hold updates to batch them, in milliseconds
; 0 asks for immediate delivery (default: 0)
max_wait_ms = {}
; How stale fixes are found on each update:
;   stop_at_first_fresh - scan from the oldest fix, stop at the first fresh one (default)
;   exhaustive          - check every fix; also removes stale fixes that arrived out of order
eviction = {}
; Provider events buffered while ingestion is busy (default: 16)
event_buffer = {}

[storage]
; SQLite database holding the persisted history
; If empty, defaults to <local data directory>/gpstrail/locations.db
database = {}
; Pending write-through records before new ones are dropped (default: 256, max: 65536)
writer_queue = {}

[logging]
; Directory for the session log (default: logs)
directory = {}
; Log file name, truncated at the start of each session (default: gpstrail.log)
file = {}
"#,
        config.tracking.retention_secs,
        config.tracking.update_interval_ms,
        config.tracking.priority,
        config.tracking.max_wait_ms,
        config.tracking.eviction,
        config.tracking.event_buffer,
        path_to_string(&config.storage.database),
        config.storage.writer_queue,
        path_to_string(&config.logging.directory),
        config.logging.file,
    )
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
