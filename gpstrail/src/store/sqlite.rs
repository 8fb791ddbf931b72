//! SQLite-backed location store.
//!
//! One table, one row per persisted fix:
//!
//! ```text
//! location_records(
//!     id               INTEGER PRIMARY KEY AUTOINCREMENT,
//!     acquisition_time INTEGER NOT NULL,
//!     latitude         REAL    NOT NULL,
//!     longitude        REAL    NOT NULL,
//!     altitude         REAL    NOT NULL,
//!     bearing          TEXT    NOT NULL DEFAULT '',
//!     accuracy         TEXT    NOT NULL DEFAULT '',
//!     speed            TEXT    NOT NULL DEFAULT ''
//! )
//! ```
//!
//! Rows are decoded individually so one corrupt row surfaces as a
//! [`RecordError`] in its position instead of failing the whole read.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use tracing::{debug, info};

use super::r#trait::LocationStore;
use super::record::{StoredRecord, UNASSIGNED_ID};
use super::types::{LoadedRecord, RecordError, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS location_records (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    acquisition_time INTEGER NOT NULL,
    latitude         REAL    NOT NULL,
    longitude        REAL    NOT NULL,
    altitude         REAL    NOT NULL,
    bearing          TEXT    NOT NULL DEFAULT '',
    accuracy         TEXT    NOT NULL DEFAULT '',
    speed            TEXT    NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_location_records_time
    ON location_records(acquisition_time);
";

// Rows whose time is not an integer sort last: SQLite orders TEXT above
// every number, which would otherwise put a corrupt row at the head.
const SELECT_ORDERED: &str = "
SELECT id, acquisition_time, latitude, longitude, altitude, bearing, accuracy, speed
FROM location_records
ORDER BY typeof(acquisition_time) <> 'integer', acquisition_time DESC, id DESC
";

/// Location store persisted in an SQLite database.
pub struct SqliteLocationStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteLocationStore {
    /// Open (or create) the database at `path`.
    ///
    /// Missing parent directories are created. File databases use WAL
    /// journaling.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "Opened location database");

        let store = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        store.init_schema()?;
        info!(
            path = %path.display(),
            records = store.count()?,
            "Location store ready"
        );
        Ok(store)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Database file path, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.lock().execute_batch(SCHEMA)?;
        Ok(())
    }

    fn insert_with(conn: &Connection, record: &StoredRecord) -> Result<i64, StoreError> {
        if record.id == UNASSIGNED_ID {
            conn.execute(
                "INSERT INTO location_records
                    (acquisition_time, latitude, longitude, altitude, bearing, accuracy, speed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.acquisition_time,
                    record.latitude,
                    record.longitude,
                    record.altitude,
                    record.bearing,
                    record.accuracy,
                    record.speed,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        } else {
            conn.execute(
                "INSERT OR REPLACE INTO location_records
                    (id, acquisition_time, latitude, longitude, altitude, bearing, accuracy, speed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.acquisition_time,
                    record.latitude,
                    record.longitude,
                    record.altitude,
                    record.bearing,
                    record.accuracy,
                    record.speed,
                ],
            )?;
            Ok(record.id)
        }
    }

    /// Run arbitrary SQL against the database.
    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> Result<(), StoreError> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }
}

/// Decode one row, reporting unreadable columns instead of failing.
fn decode_row(row: &Row<'_>) -> rusqlite::Result<LoadedRecord> {
    let id: i64 = row.get(0)?;
    Ok(decode_columns(row, id))
}

fn decode_columns(row: &Row<'_>, id: i64) -> Result<StoredRecord, RecordError> {
    let acquisition_time = row
        .get::<_, i64>(1)
        .map_err(|_| RecordError::UnreadableTimestamp { id })?;

    let coordinate = |index: usize, column: &'static str| {
        row.get::<_, f64>(index)
            .map_err(|e| RecordError::UnreadableColumn {
                id,
                column,
                reason: e.to_string(),
            })
    };
    let measurement = |index: usize, column: &'static str| {
        row.get::<_, Option<String>>(index)
            .map(Option::unwrap_or_default)
            .map_err(|e| RecordError::UnreadableColumn {
                id,
                column,
                reason: e.to_string(),
            })
    };

    Ok(StoredRecord {
        id,
        acquisition_time,
        latitude: coordinate(2, "latitude")?,
        longitude: coordinate(3, "longitude")?,
        altitude: coordinate(4, "altitude")?,
        bearing: measurement(5, "bearing")?,
        accuracy: measurement(6, "accuracy")?,
        speed: measurement(7, "speed")?,
    })
}

impl LocationStore for SqliteLocationStore {
    fn insert(&self, record: &StoredRecord) -> Result<i64, StoreError> {
        let conn = self.conn.lock();
        Self::insert_with(&conn, record)
    }

    fn load_ordered(&self) -> Result<Vec<LoadedRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(SELECT_ORDERED)?;
        let rows = stmt
            .query_map([], decode_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn clear_all(&self) -> Result<(), StoreError> {
        let removed = self.conn.lock().execute("DELETE FROM location_records", [])?;
        debug!(removed, "Cleared location records");
        Ok(())
    }

    fn replace_all(&self, records: &[StoredRecord]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM location_records", [])?;
        for record in records {
            Self::insert_with(&tx, record)?;
        }
        tx.commit()?;
        debug!(records = records.len(), "Replaced location records");
        Ok(())
    }

    fn count(&self) -> Result<usize, StoreError> {
        let count: i64 =
            self.conn
                .lock()
                .query_row("SELECT COUNT(*) FROM location_records", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

impl std::fmt::Debug for SqliteLocationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLocationStore")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::Fix;
    use tempfile::TempDir;

    fn record_at(time: i64) -> StoredRecord {
        StoredRecord::from_fix(&Fix::new(time, 45.4642, 9.19, 122.0).with_speed(1.5))
    }

    fn times(store: &SqliteLocationStore) -> Vec<i64> {
        store
            .load_ordered()
            .unwrap()
            .into_iter()
            .map(|r| r.unwrap().acquisition_time)
            .collect()
    }

    #[test]
    fn test_insert_and_load_newest_first() {
        let store = SqliteLocationStore::open_in_memory().unwrap();
        for time in [1_000, 3_000, 2_000] {
            store.insert(&record_at(time)).unwrap();
        }

        assert_eq!(times(&store), vec![3_000, 2_000, 1_000]);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_record_fields_survive_storage() {
        let store = SqliteLocationStore::open_in_memory().unwrap();
        let fix = Fix::new(5_000, -33.8688, 151.2093, 58.0).with_accuracy(4.0);
        let id = store.insert(&StoredRecord::from_fix(&fix)).unwrap();

        let loaded = store.load_ordered().unwrap().remove(0).unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.to_fix().unwrap(), fix);
        assert_eq!(loaded.bearing, "");
    }

    #[test]
    fn test_insert_with_existing_id_replaces() {
        let store = SqliteLocationStore::open_in_memory().unwrap();
        let id = store.insert(&record_at(1_000)).unwrap();

        store.insert(&record_at(9_000).with_id(id)).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(times(&store), vec![9_000]);
    }

    #[test]
    fn test_replace_all_preserves_ids() {
        let store = SqliteLocationStore::open_in_memory().unwrap();
        store.insert(&record_at(1)).unwrap();

        store
            .replace_all(&[record_at(20).with_id(7), record_at(10).with_id(3)])
            .unwrap();

        let ids: Vec<i64> = store
            .load_ordered()
            .unwrap()
            .into_iter()
            .map(|r| r.unwrap().id)
            .collect();
        assert_eq!(ids, vec![7, 3]);
    }

    #[test]
    fn test_clear_all() {
        let store = SqliteLocationStore::open_in_memory().unwrap();
        store.insert(&record_at(1)).unwrap();
        store.clear_all().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_unreadable_timestamps_sort_after_readable_rows() {
        let store = SqliteLocationStore::open_in_memory().unwrap();
        store.insert(&record_at(3_000)).unwrap();
        store
            .execute_raw(
                "INSERT INTO location_records (id, acquisition_time, latitude, longitude, altitude)
                 VALUES (50, 2000.5, 1.0, 2.0, 3.0);
                 INSERT INTO location_records (id, acquisition_time, latitude, longitude, altitude)
                 VALUES (51, 'yesterday', 1.0, 2.0, 3.0)",
            )
            .unwrap();
        store.insert(&record_at(1_000)).unwrap();

        let rows = store.load_ordered().unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].as_ref().unwrap().acquisition_time, 3_000);
        assert_eq!(rows[1].as_ref().unwrap().acquisition_time, 1_000);
        assert!(rows[2..]
            .iter()
            .all(|row| matches!(row, Err(RecordError::UnreadableTimestamp { .. }))));
    }

    #[test]
    fn test_unreadable_coordinate_is_reported() {
        let store = SqliteLocationStore::open_in_memory().unwrap();
        store
            .execute_raw(
                "INSERT INTO location_records (id, acquisition_time, latitude, longitude, altitude)
                 VALUES (8, 1000, 'north', 2.0, 3.0)",
            )
            .unwrap();

        let rows = store.load_ordered().unwrap();
        assert!(matches!(
            &rows[0],
            Err(RecordError::UnreadableColumn { id: 8, column: "latitude", .. })
        ));
    }

    #[test]
    fn test_file_database_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("locations.db");

        {
            let store = SqliteLocationStore::open(&path).unwrap();
            store.insert(&record_at(1_000)).unwrap();
            store.insert(&record_at(2_000)).unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
        }

        let reopened = SqliteLocationStore::open(&path).unwrap();
        assert_eq!(times(&reopened), vec![2_000, 1_000]);
    }
}
