//! Startup recovery: rebuild the retention window from the store.
//!
//! Records are read newest first. The walk keeps every record until it meets
//! the first stale one and stops there, assuming everything older is stale
//! too. Retained records are then written back in one replace, so expired
//! rows left over from the previous run cannot resurface after a second
//! restart.
//!
//! Decode problems are handled per record:
//!
//! - an unreadable acquisition time halts the walk, because the record's
//!   place in the ordering is unknown; stores list such records after every
//!   readable one, so only the unreadable tail is lost
//! - a malformed measurement or unreadable coordinate skips that record only

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::fix::is_stale;
use crate::store::{LocationStore, StoreError, StoredRecord};
use crate::time::EpochMillis;
use crate::window::{RetentionWindow, DEFAULT_TTL};

/// Why the recovery walk stopped before the end of the record list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryHalt {
    /// First stale record reached.
    Stale { acquisition_time: EpochMillis },
    /// A record whose acquisition time could not be read.
    UnreadableRecord { id: i64 },
}

/// Summary of one recovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Rows returned by the store.
    pub loaded: usize,
    /// Fixes seeded into the window.
    pub retained: usize,
    /// Records skipped because they could not be decoded.
    pub skipped_malformed: usize,
    /// Where the walk stopped, if it stopped early.
    pub halted_on: Option<RecoveryHalt>,
    /// Whether the retained records were written back successfully.
    pub repersisted: bool,
}

impl RecoveryReport {
    /// Rows that were loaded but did not make it into the window.
    pub fn discarded(&self) -> usize {
        self.loaded - self.retained
    }
}

/// Reconciles the window with the store at startup.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryManager {
    ttl: Duration,
}

impl Default for RecoveryManager {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl RecoveryManager {
    /// Create a manager applying `ttl`, the same TTL as live eviction.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Seed `window` from `store` as of `now`.
    ///
    /// The window is cleared first, so running recovery twice yields the
    /// same contents. Only a failure to read the store is returned as an
    /// error; a failed write-back is logged and reported in
    /// [`RecoveryReport::repersisted`].
    pub fn recover(
        &self,
        store: &dyn LocationStore,
        window: &mut RetentionWindow,
        now: EpochMillis,
    ) -> Result<RecoveryReport, StoreError> {
        window.clear();

        let rows = store.load_ordered()?;
        let mut report = RecoveryReport {
            loaded: rows.len(),
            ..RecoveryReport::default()
        };
        let mut retained: Vec<StoredRecord> = Vec::new();

        for row in rows {
            let record = match row {
                Ok(record) => record,
                Err(e) if e.halts_recovery() => {
                    warn!(error = %e, "Stopping recovery at unreadable record");
                    report.halted_on = Some(RecoveryHalt::UnreadableRecord { id: e.record_id() });
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable record");
                    report.skipped_malformed += 1;
                    continue;
                }
            };

            if is_stale(record.acquisition_time, now, self.ttl) {
                debug!(
                    id = record.id,
                    time = record.acquisition_time,
                    "Reached first stale record"
                );
                report.halted_on = Some(RecoveryHalt::Stale {
                    acquisition_time: record.acquisition_time,
                });
                break;
            }

            match record.to_fix() {
                Ok(fix) => {
                    window.push_oldest(fix);
                    retained.push(record);
                }
                Err(e) => {
                    warn!(error = %e, "Skipping malformed record");
                    report.skipped_malformed += 1;
                }
            }
        }

        report.retained = retained.len();

        match store.replace_all(&retained) {
            Ok(()) => report.repersisted = true,
            Err(e) => warn!(
                retained = retained.len(),
                error = %e,
                "Failed to write back recovered records"
            ),
        }

        info!(
            loaded = report.loaded,
            retained = report.retained,
            skipped = report.skipped_malformed,
            halted_on = ?report.halted_on,
            "Recovered location history"
        );

        Ok(report)
    }
}
