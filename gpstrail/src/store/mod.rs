//! Durable storage for retained fixes.
//!
//! - [`LocationStore`] - backend trait (insert, ordered load, clear, replace)
//! - [`SqliteLocationStore`] - on-disk SQLite table
//! - [`MemoryLocationStore`] - volatile map, used in tests
//! - [`StoredRecord`] - row representation with text-encoded optional
//!   measurements
//! - [`PersistenceWriter`] - background thread applying writes in order

mod memory;
mod record;
mod sqlite;
mod r#trait;
mod types;
mod writer;

pub use memory::MemoryLocationStore;
pub use r#trait::LocationStore;
pub use record::{decode_measurement, encode_measurement, StoredRecord, UNASSIGNED_ID};
pub use sqlite::SqliteLocationStore;
pub use types::{LoadedRecord, RecordError, StoreError};
pub use writer::{PersistenceWriter, WriterStats, DEFAULT_WRITER_QUEUE};
