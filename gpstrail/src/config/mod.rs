//! Configuration for gpstrail.
//!
//! The user configuration lives in `~/.gpstrail/config.ini`:
//!
//! - [`ConfigFile`] - parsed file, one struct per `[section]`
//! - [`ConfigFileError`] - read, write and validation failures
//!
//! # Example
//!
//! ```no_run
//! use gpstrail::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! println!("retention: {}s", config.tracking.retention_secs);
//! # Ok::<(), gpstrail::config::ConfigFileError>(())
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::{
    default_database_path, DEFAULT_DATABASE_FILE, DEFAULT_EVENT_BUFFER, DEFAULT_LOG_DIRECTORY,
    DEFAULT_LOG_FILE, DEFAULT_MAX_WAIT_MS, DEFAULT_RETENTION_SECS, DEFAULT_UPDATE_INTERVAL_MS,
    DEFAULT_WRITER_QUEUE_SIZE, MAX_WRITER_QUEUE_SIZE, MIN_WRITER_QUEUE_SIZE,
};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ConfigFile, LoggingSettings, StorageSettings, TrackingSettings};
