//! Ingestion loop: the single path by which fixes enter the window.
//!
//! One ingestion cycle, executed under the window write lock:
//!
//! 1. normalize the provider payload into a [`Fix`]
//! 2. insert it at the head of the window
//! 3. evict stale fixes from the tail
//! 4. queue the new fix for write-through persistence
//! 5. take the post-eviction snapshot
//!
//! The snapshot is then broadcast to subscribers after the lock is released,
//! so a subscriber may read the window or discard history from inside its
//! callback. Readers never observe a cycle half-applied.
//!
//! Provider events arrive on a bounded `tokio::sync::mpsc` channel and are
//! drained by [`spawn_ingestion_task`] until its cancellation token fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::fix::Fix;
use crate::provider::{ProviderEvent, RawFix};
use crate::store::PersistenceWriter;
use crate::subscribers::{BroadcastReport, SubscriberRegistry};
use crate::time::Clock;
use crate::window::RetentionWindow;

/// Retention window shared between ingestion and readers.
pub type SharedWindow = Arc<RwLock<RetentionWindow>>;

/// Applies provider events to the window, the store and subscribers.
pub struct IngestionLoop {
    window: SharedWindow,
    writer: Arc<PersistenceWriter>,
    subscribers: Arc<SubscriberRegistry>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    accepting: AtomicBool,
}

impl IngestionLoop {
    pub fn new(
        window: SharedWindow,
        writer: Arc<PersistenceWriter>,
        subscribers: Arc<SubscriberRegistry>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            window,
            writer,
            subscribers,
            clock,
            ttl,
            accepting: AtomicBool::new(true),
        }
    }

    /// Dispatch one provider event.
    ///
    /// For a batch only the last (most recent) fix is ingested. An
    /// availability loss is recorded as a placeholder fix.
    pub fn on_provider_event(&self, event: ProviderEvent) -> Option<BroadcastReport> {
        match event {
            ProviderEvent::Locations(mut fixes) => match fixes.pop() {
                Some(last) => {
                    if !fixes.is_empty() {
                        trace!(skipped = fixes.len(), "Ingesting last fix of batch");
                    }
                    self.on_fix_received(last)
                }
                None => {
                    debug!("Provider delivered an empty location batch, ignoring");
                    None
                }
            },
            ProviderEvent::Availability { available: false } => self.on_provider_unavailable(),
            ProviderEvent::Availability { available: true } => {
                debug!("Provider reports locations available");
                None
            }
        }
    }

    /// Ingest a fix delivered by the provider.
    ///
    /// Returns `None` when the event was dropped because ingestion is closed.
    pub fn on_fix_received(&self, raw: RawFix) -> Option<BroadcastReport> {
        self.ingest(Fix::from(raw))
    }

    /// Record that the provider cannot produce a location right now.
    pub fn on_provider_unavailable(&self) -> Option<BroadcastReport> {
        let now = self.clock.now_millis();
        debug!(time = now, "Provider unavailable, ingesting placeholder");
        self.ingest(Fix::placeholder(now))
    }

    fn ingest(&self, fix: Fix) -> Option<BroadcastReport> {
        if !self.accepting.load(Ordering::SeqCst) {
            trace!(time = fix.timestamp, "Ingestion closed, dropping fix");
            return None;
        }

        let snapshot = {
            let mut window = self.window.write();
            // Re-checked under the lock: close() flips the flag while holding it.
            if !self.accepting.load(Ordering::SeqCst) {
                trace!(time = fix.timestamp, "Ingestion closed, dropping fix");
                return None;
            }

            let now = self.clock.now_millis();
            window.insert_newest(fix.clone());
            let evicted = window.evict_stale(now, self.ttl);
            self.writer.write_through(&fix);

            debug!(
                time = fix.timestamp,
                kind = %fix.kind,
                evicted,
                retained = window.len(),
                "Ingested fix"
            );
            window.snapshot()
        };

        Some(self.subscribers.broadcast(&snapshot))
    }

    /// Stop accepting events.
    ///
    /// Waits for an in-flight cycle to finish its window update; every
    /// event handled after this returns is dropped.
    pub fn close(&self) {
        let _window = self.window.write();
        self.accepting.store(false, Ordering::SeqCst);
    }

    /// True until [`close`](Self::close) is called.
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl std::fmt::Debug for IngestionLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionLoop")
            .field("ttl", &self.ttl)
            .field("accepting", &self.is_accepting())
            .finish()
    }
}

/// Spawn the task that drains provider events into `ingestion`.
///
/// The task ends when `cancellation` fires or the provider drops its sender.
/// Cancellation is checked before each event, so nothing is ingested once
/// the token is cancelled.
pub fn spawn_ingestion_task(
    ingestion: Arc<IngestionLoop>,
    mut events: mpsc::Receiver<ProviderEvent>,
    cancellation: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => {
                    debug!("Ingestion task stopped");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        ingestion.on_provider_event(event);
                    }
                    None => {
                        debug!("Provider event channel closed, ingestion task exiting");
                        break;
                    }
                },
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::FixKind;
    use crate::store::{LocationStore, MemoryLocationStore};
    use crate::subscribers::WindowSubscriber;
    use crate::time::ManualClock;
    use crate::window::{WindowSnapshot, DEFAULT_TTL};
    use parking_lot::Mutex;

    struct Harness {
        ingestion: Arc<IngestionLoop>,
        window: SharedWindow,
        store: Arc<MemoryLocationStore>,
        writer: Arc<PersistenceWriter>,
        subscribers: Arc<SubscriberRegistry>,
        clock: Arc<ManualClock>,
    }

    fn harness(start: i64) -> Harness {
        let window: SharedWindow = Arc::new(RwLock::new(RetentionWindow::new()));
        let store = Arc::new(MemoryLocationStore::new());
        let writer = Arc::new(PersistenceWriter::spawn(store.clone(), 64).unwrap());
        let subscribers = Arc::new(SubscriberRegistry::new());
        let clock = Arc::new(ManualClock::new(start));
        let ingestion = Arc::new(IngestionLoop::new(
            Arc::clone(&window),
            Arc::clone(&writer),
            Arc::clone(&subscribers),
            clock.clone(),
            DEFAULT_TTL,
        ));
        Harness {
            ingestion,
            window,
            store,
            writer,
            subscribers,
            clock,
        }
    }

    fn recording_subscriber() -> (Arc<dyn WindowSubscriber>, Arc<Mutex<Vec<WindowSnapshot>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscriber: Arc<dyn WindowSubscriber> =
            Arc::new(move |snapshot: &WindowSnapshot| sink.lock().push(snapshot.clone()));
        (subscriber, seen)
    }

    fn raw_at(time: i64) -> RawFix {
        RawFix::new(time, 45.4642, 9.19, 122.0)
    }

    #[test]
    fn test_fix_is_inserted_persisted_and_broadcast() {
        let h = harness(1_000);
        let (subscriber, seen) = recording_subscriber();
        h.subscribers.register(subscriber);

        let report = h.ingestion.on_fix_received(raw_at(1_000)).unwrap();
        h.writer.flush().unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(h.window.read().len(), 1);
        assert_eq!(h.store.count().unwrap(), 1);
        assert_eq!(seen.lock()[0].len(), 1);
    }

    #[test]
    fn test_broadcast_reflects_post_eviction_state() {
        let h = harness(0);
        let (subscriber, seen) = recording_subscriber();
        h.subscribers.register(subscriber);

        h.ingestion.on_fix_received(raw_at(0));
        h.clock.set(100_000);
        h.ingestion.on_fix_received(raw_at(100_000));
        h.clock.set(310_000);
        h.ingestion.on_fix_received(raw_at(310_000));

        let last = seen.lock().last().cloned().unwrap();
        let times: Vec<i64> = last.iter().map(|f| f.timestamp).collect();
        assert_eq!(times, vec![310_000, 100_000]);
    }

    #[test]
    fn test_every_subscriber_notified_once_per_fix() {
        let h = harness(0);
        let order = Arc::new(Mutex::new(Vec::new()));
        for id in 0..3 {
            let order = Arc::clone(&order);
            h.subscribers.register(Arc::new(move |_: &WindowSnapshot| {
                order.lock().push(id);
            }));
        }

        h.ingestion.on_fix_received(raw_at(0));

        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unavailable_ingests_placeholder_at_clock_time() {
        let h = harness(42_000);

        h.ingestion.on_provider_unavailable();

        let window = h.window.read();
        let newest = window.newest().unwrap();
        assert_eq!(newest.kind, FixKind::Placeholder);
        assert_eq!(newest.timestamp, 42_000);
        assert!(newest.has_no_measurements());
    }

    #[test]
    fn test_batch_ingests_only_last_fix() {
        let h = harness(5_000);

        h.ingestion.on_provider_event(ProviderEvent::Locations(vec![
            raw_at(3_000),
            raw_at(4_000),
            raw_at(5_000),
        ]));

        let window = h.window.read();
        assert_eq!(window.len(), 1);
        assert_eq!(window.newest().map(|f| f.timestamp), Some(5_000));
    }

    #[test]
    fn test_empty_batch_and_availability_true_are_ignored() {
        let h = harness(0);

        assert!(h
            .ingestion
            .on_provider_event(ProviderEvent::Locations(Vec::new()))
            .is_none());
        assert!(h
            .ingestion
            .on_provider_event(ProviderEvent::Availability { available: true })
            .is_none());
        assert!(h.window.read().is_empty());
    }

    #[test]
    fn test_availability_false_routes_to_placeholder() {
        let h = harness(7);

        h.ingestion
            .on_provider_event(ProviderEvent::Availability { available: false });

        assert_eq!(
            h.window.read().newest().map(|f| f.kind),
            Some(FixKind::Placeholder)
        );
    }

    #[test]
    fn test_closed_loop_drops_events() {
        let h = harness(0);
        h.ingestion.close();

        assert!(h.ingestion.on_fix_received(raw_at(0)).is_none());
        assert!(h.ingestion.on_provider_unavailable().is_none());
        h.writer.flush().unwrap();

        assert!(h.window.read().is_empty());
        assert_eq!(h.store.count().unwrap(), 0);
        assert!(!h.ingestion.is_accepting());
    }

    #[test]
    fn test_persistence_failure_does_not_affect_window_or_delivery() {
        let h = harness(0);
        h.store.set_fail_writes(true);
        let (subscriber, seen) = recording_subscriber();
        h.subscribers.register(subscriber);

        h.ingestion.on_fix_received(raw_at(0));
        h.writer.flush().unwrap();

        assert_eq!(h.window.read().len(), 1);
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(h.writer.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_task_drains_channel_until_cancelled() {
        let h = harness(10_000);
        let (tx, rx) = mpsc::channel(8);
        let cancellation = CancellationToken::new();
        let task = spawn_ingestion_task(Arc::clone(&h.ingestion), rx, cancellation.clone());

        tx.send(ProviderEvent::Locations(vec![raw_at(9_000)]))
            .await
            .unwrap();
        tx.send(ProviderEvent::Locations(vec![raw_at(10_000)]))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while h.window.read().len() < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("Fixes should be ingested");

        cancellation.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_task_exits_when_provider_drops_sender() {
        let h = harness(0);
        let (tx, rx) = mpsc::channel(1);
        let task = spawn_ingestion_task(Arc::clone(&h.ingestion), rx, CancellationToken::new());

        drop(tx);

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("Task should exit")
            .unwrap();
    }
}
