//! In-memory location store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::r#trait::LocationStore;
use super::record::{StoredRecord, UNASSIGNED_ID};
use super::types::{LoadedRecord, StoreError};

#[derive(Default)]
struct MemoryState {
    records: BTreeMap<i64, StoredRecord>,
    next_id: i64,
}

/// Volatile store backed by a map.
///
/// Behaves like the SQLite backend (identifier assignment, ordering,
/// replace-by-id) without touching disk. Writes can be made to fail on
/// demand to exercise persistence error paths.
#[derive(Default)]
pub struct MemoryLocationStore {
    state: Mutex<MemoryState>,
    fail_writes: AtomicBool,
}

impl MemoryLocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with [`StoreError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Copy of every record, ordered by identifier.
    pub fn records(&self) -> Vec<StoredRecord> {
        self.state.lock().records.values().cloned().collect()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory store is rejecting writes".to_string(),
            ));
        }
        Ok(())
    }

    fn insert_locked(state: &mut MemoryState, record: &StoredRecord) -> i64 {
        let id = if record.id == UNASSIGNED_ID {
            state.next_id += 1;
            state.next_id
        } else {
            state.next_id = state.next_id.max(record.id);
            record.id
        };
        state.records.insert(id, record.clone().with_id(id));
        id
    }
}

impl LocationStore for MemoryLocationStore {
    fn insert(&self, record: &StoredRecord) -> Result<i64, StoreError> {
        self.check_writable()?;
        Ok(Self::insert_locked(&mut self.state.lock(), record))
    }

    fn load_ordered(&self) -> Result<Vec<LoadedRecord>, StoreError> {
        let mut records: Vec<StoredRecord> = self.records();
        records.sort_by(|a, b| {
            b.acquisition_time
                .cmp(&a.acquisition_time)
                .then(b.id.cmp(&a.id))
        });
        Ok(records.into_iter().map(Ok).collect())
    }

    fn clear_all(&self) -> Result<(), StoreError> {
        self.check_writable()?;
        self.state.lock().records.clear();
        Ok(())
    }

    fn replace_all(&self, records: &[StoredRecord]) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock();
        state.records.clear();
        for record in records {
            Self::insert_locked(&mut state, record);
        }
        Ok(())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.state.lock().records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::Fix;

    fn record_at(time: i64) -> StoredRecord {
        StoredRecord::from_fix(&Fix::new(time, 45.0, 9.0, 100.0))
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let store = MemoryLocationStore::new();

        let a = store.insert(&record_at(1)).unwrap();
        let b = store.insert(&record_at(2)).unwrap();

        assert!(b > a);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_insert_with_id_replaces() {
        let store = MemoryLocationStore::new();
        let id = store.insert(&record_at(1)).unwrap();

        store.insert(&record_at(5).with_id(id)).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.records()[0].acquisition_time, 5);
    }

    #[test]
    fn test_load_ordered_newest_first() {
        let store = MemoryLocationStore::new();
        for time in [30, 10, 20] {
            store.insert(&record_at(time)).unwrap();
        }

        let times: Vec<i64> = store
            .load_ordered()
            .unwrap()
            .into_iter()
            .map(|r| r.unwrap().acquisition_time)
            .collect();
        assert_eq!(times, vec![30, 20, 10]);
    }

    #[test]
    fn test_equal_times_ordered_by_descending_id() {
        let store = MemoryLocationStore::new();
        let first = store.insert(&record_at(7)).unwrap();
        let second = store.insert(&record_at(7)).unwrap();

        let ids: Vec<i64> = store
            .load_ordered()
            .unwrap()
            .into_iter()
            .map(|r| r.unwrap().id)
            .collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[test]
    fn test_replace_all_keeps_ids_and_advances_counter() {
        let store = MemoryLocationStore::new();
        store
            .replace_all(&[record_at(1).with_id(40), record_at(2).with_id(41)])
            .unwrap();

        let fresh = store.insert(&record_at(3)).unwrap();
        assert_eq!(fresh, 42);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_failing_writes() {
        let store = MemoryLocationStore::new();
        store.set_fail_writes(true);

        assert!(matches!(
            store.insert(&record_at(1)),
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.clear_all().is_err());

        store.set_fail_writes(false);
        assert!(store.insert(&record_at(1)).is_ok());
    }
}
