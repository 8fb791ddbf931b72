//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

use crate::provider::LocationPriority;
use crate::window::EvictionScan;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Retention and provider request settings
    pub tracking: TrackingSettings,
    /// Durable store settings
    pub storage: StorageSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Tracking configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSettings {
    /// How long a fix stays in the window, in seconds
    pub retention_secs: u64,
    /// Requested interval between provider updates, in milliseconds
    pub update_interval_ms: u64,
    /// Accuracy/power trade-off requested from the provider
    pub priority: LocationPriority,
    /// Maximum provider batching delay in milliseconds (0 = deliver immediately)
    pub max_wait_ms: u64,
    /// Eviction scan strategy
    pub eviction: EvictionScan,
    /// Capacity of the provider event channel
    pub event_buffer: usize,
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageSettings {
    /// SQLite database file
    pub database: PathBuf,
    /// Capacity of the persistence writer queue
    pub writer_queue: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log directory
    pub directory: PathBuf,
    /// Log file name inside the directory
    pub file: String,
}
