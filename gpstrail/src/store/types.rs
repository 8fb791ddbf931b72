//! Store error types.

use std::path::PathBuf;

use super::record::StoredRecord;

/// One row read back from the store: a record, or the reason it could not
/// be decoded.
pub type LoadedRecord = Result<StoredRecord, RecordError>;

/// Errors raised by store backends and the persistence writer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite reported an error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The database directory could not be created.
    #[error("Failed to create database directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backend refused the operation (simulated outages, closed handles).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The persistence writer thread is no longer running.
    #[error("Persistence writer has shut down")]
    WriterClosed,
}

/// Problems decoding a single stored record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    /// The acquisition time could not be read as an integer.
    #[error("Record {id}: acquisition time is unreadable")]
    UnreadableTimestamp { id: i64 },

    /// An optional measurement column holds something other than a decimal
    /// numeral or the empty string.
    #[error("Record {id}: {field} value '{value}' is not a decimal numeral")]
    MalformedMeasurement {
        id: i64,
        field: &'static str,
        value: String,
    },

    /// A coordinate column could not be read.
    #[error("Record {id}: column {column} is unreadable: {reason}")]
    UnreadableColumn {
        id: i64,
        column: &'static str,
        reason: String,
    },
}

impl RecordError {
    /// Identifier of the offending record.
    pub fn record_id(&self) -> i64 {
        match self {
            Self::UnreadableTimestamp { id }
            | Self::MalformedMeasurement { id, .. }
            | Self::UnreadableColumn { id, .. } => *id,
        }
    }

    /// Whether recovery must stop at this record.
    ///
    /// Without a timestamp the record's position in the newest-first order
    /// is unknown, so nothing after it can be trusted to be fresh.
    pub fn halts_recovery(&self) -> bool {
        matches!(self, Self::UnreadableTimestamp { .. })
    }
}
