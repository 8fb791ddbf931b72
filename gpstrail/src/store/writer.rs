//! Background persistence writer.
//!
//! Store writes happen on a dedicated thread so ingestion never blocks on
//! disk. Commands are processed strictly in submission order, which gives two
//! guarantees callers rely on:
//!
//! - a bulk replace or clear submitted after a write-through insert is applied
//!   after that insert
//! - once [`PersistenceWriter::flush`] returns, everything submitted before it
//!   has reached the store
//!
//! Write-through inserts are fire-and-forget: if the queue is full the record
//! is dropped and counted. Bulk operations block until the writer thread has
//! applied them and report the store's result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::fix::Fix;

use super::r#trait::LocationStore;
use super::record::StoredRecord;
use super::types::StoreError;

/// Default queue depth between ingestion and the writer thread.
pub const DEFAULT_WRITER_QUEUE: usize = 256;

type Ack = SyncSender<Result<(), StoreError>>;

enum WriterCommand {
    Insert(StoredRecord),
    ReplaceAll(Vec<StoredRecord>, Ack),
    Clear(Ack),
    Flush(Ack),
    Shutdown,
}

#[derive(Default)]
struct WriterCounters {
    written: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time writer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Write-through records stored successfully.
    pub written: u64,
    /// Write-through records the store rejected.
    pub failed: u64,
    /// Write-through records dropped before reaching the store.
    pub dropped: u64,
}

/// Handle to the persistence writer thread.
///
/// Dropping the handle shuts the thread down after it drains the queue.
pub struct PersistenceWriter {
    tx: SyncSender<WriterCommand>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<WriterCounters>,
}

impl PersistenceWriter {
    /// Spawn the writer thread with a queue of `capacity` commands.
    pub fn spawn(store: Arc<dyn LocationStore>, capacity: usize) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        let counters = Arc::new(WriterCounters::default());
        let thread_counters = Arc::clone(&counters);

        let thread_handle = thread::Builder::new()
            .name("location-writer".to_string())
            .spawn(move || Self::run_loop(store, rx, thread_counters))?;

        info!(capacity, "Persistence writer started");

        Ok(Self {
            tx,
            thread_handle: Mutex::new(Some(thread_handle)),
            counters,
        })
    }

    fn run_loop(
        store: Arc<dyn LocationStore>,
        rx: Receiver<WriterCommand>,
        counters: Arc<WriterCounters>,
    ) {
        while let Ok(command) = rx.recv() {
            match command {
                WriterCommand::Insert(record) => match store.insert(&record) {
                    Ok(id) => {
                        counters.written.fetch_add(1, Ordering::Relaxed);
                        trace!(id, time = record.acquisition_time, "Persisted fix");
                    }
                    Err(e) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(time = record.acquisition_time, error = %e, "Failed to persist fix");
                    }
                },
                WriterCommand::ReplaceAll(records, ack) => {
                    let result = store.replace_all(&records);
                    if let Err(e) = &result {
                        warn!(records = records.len(), error = %e, "Failed to replace stored fixes");
                    }
                    let _ = ack.send(result);
                }
                WriterCommand::Clear(ack) => {
                    let result = store.clear_all();
                    if let Err(e) = &result {
                        warn!(error = %e, "Failed to clear stored fixes");
                    }
                    let _ = ack.send(result);
                }
                WriterCommand::Flush(ack) => {
                    let _ = ack.send(Ok(()));
                }
                WriterCommand::Shutdown => {
                    debug!("Persistence writer received shutdown signal");
                    break;
                }
            }
        }

        debug!("Persistence writer stopped");
    }

    /// Queue a single fix for insertion without waiting.
    ///
    /// Returns false if the fix was dropped because the queue is full or the
    /// writer has stopped.
    pub fn write_through(&self, fix: &Fix) -> bool {
        match self.tx.try_send(WriterCommand::Insert(StoredRecord::from_fix(fix))) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(time = fix.timestamp, "Persistence queue full, fix not written through");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(time = fix.timestamp, "Persistence writer stopped, fix not written through");
                false
            }
        }
    }

    /// Replace the store contents with `fixes` (newest first) and wait.
    ///
    /// Records are inserted oldest first so store identifiers increase with
    /// acquisition time.
    pub fn write_all(&self, fixes: &[Fix]) -> Result<(), StoreError> {
        let records = fixes.iter().rev().map(StoredRecord::from_fix).collect();
        self.request(|ack| WriterCommand::ReplaceAll(records, ack))
    }

    /// Remove every stored record and wait.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        self.request(WriterCommand::Clear)
    }

    /// Wait until every previously queued command has been applied.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.request(WriterCommand::Flush)
    }

    fn request(&self, make: impl FnOnce(Ack) -> WriterCommand) -> Result<(), StoreError> {
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);
        self.tx
            .send(make(ack_tx))
            .map_err(|_| StoreError::WriterClosed)?;
        ack_rx.recv().map_err(|_| StoreError::WriterClosed)?
    }

    /// Current counters.
    pub fn stats(&self) -> WriterStats {
        WriterStats {
            written: self.counters.written.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Check if the writer thread is still running.
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Drain the queue, stop the thread and wait for it.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        let Some(handle) = self.thread_handle.lock().take() else {
            return;
        };

        let _ = self.tx.send(WriterCommand::Shutdown);
        if let Err(e) = handle.join() {
            warn!("Persistence writer thread panicked: {:?}", e);
        }

        let stats = self.stats();
        info!(
            written = stats.written,
            failed = stats.failed,
            dropped = stats.dropped,
            "Persistence writer shut down"
        );
    }
}

impl Drop for PersistenceWriter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for PersistenceWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceWriter")
            .field("stats", &self.stats())
            .field("running", &self.is_running())
            .finish()
    }
}
