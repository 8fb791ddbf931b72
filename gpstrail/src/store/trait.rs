//! Store trait definition for dependency injection.

use super::record::StoredRecord;
use super::types::{LoadedRecord, StoreError};

/// Durable table of location records.
///
/// Backends are interchangeable: [`SqliteLocationStore`] for the on-device
/// database, [`MemoryLocationStore`] for tests and ephemeral sessions.
///
/// [`SqliteLocationStore`]: super::SqliteLocationStore
/// [`MemoryLocationStore`]: super::MemoryLocationStore
///
/// # Example
///
/// ```
/// use gpstrail::fix::Fix;
/// use gpstrail::store::{LocationStore, MemoryLocationStore, StoredRecord};
///
/// fn persist(store: &dyn LocationStore, fix: &Fix) {
///     store.insert(&StoredRecord::from_fix(fix)).ok();
/// }
///
/// let store = MemoryLocationStore::new();
/// persist(&store, &Fix::new(1_000, 45.0, 9.0, 120.0));
/// assert_eq!(store.count().unwrap(), 1);
/// ```
pub trait LocationStore: Send + Sync {
    /// Insert one record and return its identifier.
    ///
    /// A record with id `0` gets a fresh identifier. Any other id is kept,
    /// replacing a row with the same id if one exists.
    fn insert(&self, record: &StoredRecord) -> Result<i64, StoreError>;

    /// Every row, newest acquisition time first, ties broken by descending
    /// id. Rows that cannot be decoded are returned as errors rather than
    /// aborting the read. Rows whose acquisition time is unreadable come
    /// after every readable row.
    fn load_ordered(&self) -> Result<Vec<LoadedRecord>, StoreError>;

    /// Remove every row.
    fn clear_all(&self) -> Result<(), StoreError>;

    /// Replace the table contents with `records`.
    ///
    /// The default clears then inserts one by one; backends with
    /// transactions should make this atomic.
    fn replace_all(&self, records: &[StoredRecord]) -> Result<(), StoreError> {
        self.clear_all()?;
        for record in records {
            self.insert(record)?;
        }
        Ok(())
    }

    /// Number of rows.
    fn count(&self) -> Result<usize, StoreError>;
}
