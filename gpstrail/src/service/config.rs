//! Service configuration types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{default_database_path, ConfigFile, DEFAULT_EVENT_BUFFER};
use crate::provider::LocationRequest;
use crate::store::DEFAULT_WRITER_QUEUE;
use crate::window::{EvictionScan, DEFAULT_TTL};

/// Default interval of the DEBUG window logger (30 seconds).
pub const DEFAULT_WINDOW_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for the tracking service.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use gpstrail::service::ServiceConfig;
/// use gpstrail::window::EvictionScan;
///
/// let config = ServiceConfig::builder()
///     .retention(Duration::from_secs(120))
///     .eviction(EvictionScan::Exhaustive)
///     .build();
///
/// assert_eq!(config.retention(), Duration::from_secs(120));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// How long a fix stays in the window
    retention: Duration,
    /// Provider subscription parameters
    request: LocationRequest,
    /// Eviction scan strategy
    eviction: EvictionScan,
    /// Capacity of the provider event channel
    event_buffer: usize,
    /// Capacity of the persistence writer queue
    writer_queue: usize,
    /// SQLite database file
    database: PathBuf,
    /// Interval of the DEBUG window logger
    window_log_interval: Duration,
}

impl ServiceConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Derive the service configuration from the user config file.
    pub fn from_config_file(file: &ConfigFile) -> Self {
        let tracking = &file.tracking;
        let interval = Duration::from_millis(tracking.update_interval_ms);
        Self::builder()
            .retention(Duration::from_secs(tracking.retention_secs))
            .request(LocationRequest {
                interval,
                fastest_interval: interval,
                priority: tracking.priority,
                max_wait: Duration::from_millis(tracking.max_wait_ms),
            })
            .eviction(tracking.eviction)
            .event_buffer(tracking.event_buffer)
            .writer_queue(file.storage.writer_queue)
            .database(file.storage.database.clone())
            .build()
    }

    /// Get the retention window (the fix time-to-live).
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Get the provider subscription parameters.
    pub fn request(&self) -> &LocationRequest {
        &self.request
    }

    /// Get the eviction scan strategy.
    pub fn eviction(&self) -> EvictionScan {
        self.eviction
    }

    /// Get the provider event channel capacity.
    pub fn event_buffer(&self) -> usize {
        self.event_buffer
    }

    /// Get the persistence writer queue capacity.
    pub fn writer_queue(&self) -> usize {
        self.writer_queue
    }

    /// Get the SQLite database path.
    pub fn database(&self) -> &Path {
        &self.database
    }

    /// Get the DEBUG window logger interval.
    pub fn window_log_interval(&self) -> Duration {
        self.window_log_interval
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            retention: DEFAULT_TTL,
            request: LocationRequest::default(),
            eviction: EvictionScan::default(),
            event_buffer: DEFAULT_EVENT_BUFFER,
            writer_queue: DEFAULT_WRITER_QUEUE,
            database: default_database_path(),
            window_log_interval: DEFAULT_WINDOW_LOG_INTERVAL,
        }
    }
}

/// Builder for ServiceConfig.
///
/// Unset fields keep their defaults. Zero capacities and a zero retention
/// are raised to the smallest usable value.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfigBuilder {
    retention: Option<Duration>,
    request: Option<LocationRequest>,
    eviction: Option<EvictionScan>,
    event_buffer: Option<usize>,
    writer_queue: Option<usize>,
    database: Option<PathBuf>,
    window_log_interval: Option<Duration>,
}

impl ServiceConfigBuilder {
    /// Set the retention window.
    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    /// Set the provider subscription parameters.
    pub fn request(mut self, request: LocationRequest) -> Self {
        self.request = Some(request);
        self
    }

    /// Set the eviction scan strategy.
    pub fn eviction(mut self, eviction: EvictionScan) -> Self {
        self.eviction = Some(eviction);
        self
    }

    /// Set the provider event channel capacity.
    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = Some(capacity);
        self
    }

    /// Set the persistence writer queue capacity.
    pub fn writer_queue(mut self, capacity: usize) -> Self {
        self.writer_queue = Some(capacity);
        self
    }

    /// Set the SQLite database path.
    pub fn database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database = Some(path.into());
        self
    }

    /// Set the DEBUG window logger interval.
    pub fn window_log_interval(mut self, interval: Duration) -> Self {
        self.window_log_interval = Some(interval);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ServiceConfig {
        let defaults = ServiceConfig::default();
        ServiceConfig {
            retention: self
                .retention
                .unwrap_or(defaults.retention)
                .max(Duration::from_millis(1)),
            request: self.request.unwrap_or(defaults.request),
            eviction: self.eviction.unwrap_or(defaults.eviction),
            event_buffer: self.event_buffer.unwrap_or(defaults.event_buffer).max(1),
            writer_queue: self.writer_queue.unwrap_or(defaults.writer_queue).max(1),
            database: self.database.unwrap_or(defaults.database),
            window_log_interval: self
                .window_log_interval
                .unwrap_or(defaults.window_log_interval)
                .max(Duration::from_millis(1)),
        }
    }
}
