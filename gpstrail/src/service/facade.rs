//! Tracking service: lifecycle controller of one tracking session.
//!
//! The service owns the retention window, the subscriber registry and the
//! injected store, provider and clock. A session runs between [`start`] and
//! [`stop`]:
//!
//! - `start` recovers the window from the store, spawns the persistence
//!   writer and the ingestion task, then subscribes to the provider
//! - `stop` closes ingestion, unsubscribes, writes the window back to the
//!   store and drops all subscribers
//!
//! Locks are always taken in the order session, then window. Subscribers are
//! never called while either lock is held.
//!
//! [`start`]: TrackingService::start
//! [`stop`]: TrackingService::stop

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, enabled, info, warn, Level};

use crate::fix::Fix;
use crate::ingest::{spawn_ingestion_task, IngestionLoop, SharedWindow};
use crate::provider::LocationProvider;
use crate::recovery::{RecoveryManager, RecoveryReport};
use crate::store::{LocationStore, PersistenceWriter, SqliteLocationStore, WriterStats};
use crate::subscribers::{SubscriberRegistry, WindowSubscriber};
use crate::time::{Clock, SystemClock};
use crate::window::{RetentionWindow, WindowSnapshot};

use super::config::ServiceConfig;
use super::error::ServiceError;
use super::logger::spawn_window_logger;

/// Point-in-time status of the service.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingStatus {
    /// Whether a session is running.
    pub active: bool,
    /// Fixes currently in the window.
    pub retained: usize,
    /// Most recent fix, if any.
    pub newest: Option<Fix>,
    /// Persistence writer counters of the running session.
    pub writer: Option<WriterStats>,
}

struct ActiveSession {
    ingestion: Arc<IngestionLoop>,
    writer: Arc<PersistenceWriter>,
    cancellation: CancellationToken,
    _task: JoinHandle<()>,
    _logger: Option<JoinHandle<()>>,
}

/// Location tracking service.
pub struct TrackingService {
    config: ServiceConfig,
    store: Arc<dyn LocationStore>,
    provider: Arc<dyn LocationProvider>,
    clock: Arc<dyn Clock>,
    window: SharedWindow,
    subscribers: Arc<SubscriberRegistry>,
    recovery: RecoveryManager,
    session: Mutex<Option<ActiveSession>>,
    last_recovery: Mutex<Option<RecoveryReport>>,
}

impl TrackingService {
    /// Create a service using the wall clock.
    pub fn new(
        config: ServiceConfig,
        store: Arc<dyn LocationStore>,
        provider: Arc<dyn LocationProvider>,
    ) -> Self {
        Self::with_clock(config, store, provider, Arc::new(SystemClock))
    }

    /// Create a service with an explicit clock.
    pub fn with_clock(
        config: ServiceConfig,
        store: Arc<dyn LocationStore>,
        provider: Arc<dyn LocationProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let window = RetentionWindow::with_scan(config.eviction());
        let recovery = RecoveryManager::new(config.retention());
        Self {
            config,
            store,
            provider,
            clock,
            window: Arc::new(RwLock::new(window)),
            subscribers: Arc::new(SubscriberRegistry::new()),
            recovery,
            session: Mutex::new(None),
            last_recovery: Mutex::new(None),
        }
    }

    /// Create a service backed by the SQLite database named in `config`.
    pub fn open(
        config: ServiceConfig,
        provider: Arc<dyn LocationProvider>,
    ) -> Result<Self, ServiceError> {
        let store = SqliteLocationStore::open(config.database())?;
        Ok(Self::new(config, Arc::new(store), provider))
    }

    /// Start a session.
    ///
    /// Returns `Ok(false)` without doing anything if a session is already
    /// running. Must be called from within a Tokio runtime.
    ///
    /// A store that cannot be read leaves the window empty, and a provider
    /// that refuses the subscription is recorded as a placeholder fix; the
    /// session starts in both cases.
    pub fn start(&self) -> Result<bool, ServiceError> {
        let ingestion = {
            let mut session = self.session.lock();
            if session.is_some() {
                debug!("Tracking already active, ignoring start");
                return Ok(false);
            }
            if tokio::runtime::Handle::try_current().is_err() {
                return Err(ServiceError::NoRuntime);
            }

            self.run_recovery();

            let writer = Arc::new(
                PersistenceWriter::spawn(Arc::clone(&self.store), self.config.writer_queue())
                    .map_err(ServiceError::WriterSpawn)?,
            );
            let ingestion = Arc::new(IngestionLoop::new(
                Arc::clone(&self.window),
                Arc::clone(&writer),
                Arc::clone(&self.subscribers),
                Arc::clone(&self.clock),
                self.config.retention(),
            ));

            let (events_tx, events_rx) = mpsc::channel(self.config.event_buffer());
            let cancellation = CancellationToken::new();
            let task = spawn_ingestion_task(Arc::clone(&ingestion), events_rx, cancellation.clone());
            let logger = enabled!(Level::DEBUG).then(|| {
                spawn_window_logger(
                    Arc::clone(&self.window),
                    cancellation.clone(),
                    self.config.window_log_interval(),
                )
            });

            let request = self.config.request();
            let subscribed = match self.provider.request_location_updates(request, events_tx) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Location updates could not be requested");
                    false
                }
            };

            info!(
                interval_ms = request.interval.as_millis() as u64,
                priority = %request.priority,
                retention_secs = self.config.retention().as_secs(),
                subscribed,
                "Tracking started"
            );

            *session = Some(ActiveSession {
                ingestion: Arc::clone(&ingestion),
                writer,
                cancellation,
                _task: task,
                _logger: logger,
            });

            (!subscribed).then_some(ingestion)
        };

        if let Some(ingestion) = ingestion {
            ingestion.on_provider_unavailable();
        }
        Ok(true)
    }

    fn run_recovery(&self) {
        let mut window = self.window.write();
        let now = self.clock.now_millis();
        match self.recovery.recover(self.store.as_ref(), &mut window, now) {
            Ok(report) => {
                *self.last_recovery.lock() = Some(report);
            }
            Err(e) => {
                warn!(error = %e, "Recovery failed, starting with an empty window");
                *self.last_recovery.lock() = None;
            }
        }
    }

    /// Stop the session.
    ///
    /// Returns false if no session was running. Safe to call at any time;
    /// subscribers are dropped either way. Events delivered after this
    /// begins are discarded.
    pub fn stop(&self) -> bool {
        let mut session = self.session.lock();
        let Some(active) = session.take() else {
            self.subscribers.clear();
            debug!("Tracking not active, nothing to stop");
            return false;
        };

        active.ingestion.close();
        self.provider.remove_location_updates();
        active.cancellation.cancel();

        let snapshot = self.window.read().snapshot();
        if let Err(e) = active.writer.write_all(snapshot.as_slice()) {
            warn!(retained = snapshot.len(), error = %e, "Failed to persist window on stop");
        }
        active.writer.shutdown();
        self.subscribers.clear();

        info!(retained = snapshot.len(), "Tracking stopped");
        true
    }

    /// Empty both the window and the store, then notify subscribers with the
    /// empty snapshot.
    ///
    /// Runs atomically with respect to ingestion: a concurrent cycle either
    /// lands entirely before the discard or entirely after it. The empty
    /// snapshot carries the window revision of the discard, so a snapshot
    /// from an earlier cycle that is still being broadcast cannot reach
    /// subscribers after it.
    pub fn discard_history(&self) -> Result<(), ServiceError> {
        let (snapshot, result) = {
            let session = self.session.lock();
            let mut window = self.window.write();
            let discarded = window.len();
            window.clear();

            let result = match session.as_ref() {
                Some(active) => active.writer.clear_all(),
                None => self.store.clear_all(),
            };
            info!(discarded, "Location history discarded");
            (window.snapshot(), result)
        };

        self.subscribers.broadcast(&snapshot);
        result.map_err(ServiceError::from)
    }

    /// Current contents of the window, newest first.
    pub fn snapshot(&self) -> WindowSnapshot {
        self.window.read().snapshot()
    }

    /// Add a subscriber. Returns false if it was already registered.
    pub fn register(&self, subscriber: Arc<dyn WindowSubscriber>) -> bool {
        self.subscribers.register(subscriber)
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub fn unregister(&self, subscriber: &Arc<dyn WindowSubscriber>) -> bool {
        self.subscribers.unregister(subscriber)
    }

    /// Whether a session is running.
    pub fn is_active(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Current status.
    pub fn status(&self) -> TrackingStatus {
        let writer = self.session.lock().as_ref().map(|s| s.writer.stats());
        let (retained, newest) = {
            let window = self.window.read();
            (window.len(), window.newest().cloned())
        };
        TrackingStatus {
            active: writer.is_some(),
            retained,
            newest,
            writer,
        }
    }

    /// Report of the most recent successful recovery.
    pub fn last_recovery(&self) -> Option<RecoveryReport> {
        self.last_recovery.lock().clone()
    }

    /// Wait until all write-through records of the running session have
    /// reached the store. No-op when inactive.
    pub fn flush(&self) -> Result<(), ServiceError> {
        let writer = self.session.lock().as_ref().map(|s| Arc::clone(&s.writer));
        match writer {
            Some(writer) => writer.flush().map_err(ServiceError::from),
            None => Ok(()),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Drop for TrackingService {
    fn drop(&mut self) {
        if self.session.get_mut().is_some() {
            self.stop();
        }
    }
}

impl std::fmt::Debug for TrackingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingService")
            .field("config", &self.config)
            .field("active", &self.is_active())
            .field("subscribers", &self.subscribers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::FixKind;
    use crate::provider::{ManualLocationProvider, RawFix};
    use crate::store::{MemoryLocationStore, StoredRecord};
    use crate::time::ManualClock;
    use std::time::Duration;

    const START: i64 = 1_700_000_000_000;

    struct Fixture {
        service: TrackingService,
        store: Arc<MemoryLocationStore>,
        provider: Arc<ManualLocationProvider>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryLocationStore::new());
        let provider = Arc::new(ManualLocationProvider::new());
        let clock = Arc::new(ManualClock::new(START));
        let service = TrackingService::with_clock(
            ServiceConfig::default(),
            store.clone(),
            provider.clone(),
            clock.clone(),
        );
        Fixture {
            service,
            store,
            provider,
            clock,
        }
    }

    async fn wait_for_len(service: &TrackingService, len: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while service.snapshot().len() != len {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("Window should reach expected size");
    }

    #[test]
    fn test_start_without_runtime_fails() {
        let f = fixture();
        assert!(matches!(f.service.start(), Err(ServiceError::NoRuntime)));
        assert!(!f.service.is_active());
    }

    #[test]
    fn test_stop_without_start_is_safe() {
        let f = fixture();
        f.service
            .register(Arc::new(|_: &WindowSnapshot| {}) as Arc<dyn WindowSubscriber>);

        assert!(!f.service.stop());
        assert_eq!(f.service.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_second_start_is_noop() {
        let f = fixture();

        assert!(f.service.start().unwrap());
        assert!(!f.service.start().unwrap());
        assert!(f.service.is_active());

        f.service.stop();
    }

    #[tokio::test]
    async fn test_start_subscribes_with_high_accuracy_request() {
        let f = fixture();
        f.service.start().unwrap();

        let request = f.provider.active_request().unwrap();
        assert_eq!(request.interval, Duration::from_millis(2000));
        assert!(request.is_unbuffered());

        f.service.stop();
        assert!(!f.provider.is_subscribed());
    }

    #[tokio::test]
    async fn test_start_runs_recovery() {
        let f = fixture();
        for time in [START - 400_000, START - 100_000] {
            f.store
                .insert(&StoredRecord::from_fix(&Fix::new(time, 45.0, 9.0, 0.0)))
                .unwrap();
        }

        f.service.start().unwrap();

        let times: Vec<i64> = f.service.snapshot().iter().map(|f| f.timestamp).collect();
        assert_eq!(times, vec![START - 100_000]);
        assert_eq!(f.service.last_recovery().unwrap().retained, 1);
        f.service.stop();
    }

    #[tokio::test]
    async fn test_fix_flows_to_window_and_store() {
        let f = fixture();
        f.service.start().unwrap();

        f.provider
            .deliver_fix(RawFix::new(START, 45.4642, 9.19, 122.0));
        wait_for_len(&f.service, 1).await;
        f.service.flush().unwrap();

        assert_eq!(f.store.count().unwrap(), 1);
        let status = f.service.status();
        assert!(status.active);
        assert_eq!(status.retained, 1);
        assert_eq!(status.writer.unwrap().written, 1);

        f.service.stop();
    }

    #[tokio::test]
    async fn test_stop_writes_window_back() {
        let f = fixture();
        f.service.start().unwrap();
        for offset in 0..3 {
            f.provider
                .deliver_fix(RawFix::new(START + offset, 45.0, 9.0, 0.0));
        }
        wait_for_len(&f.service, 3).await;

        f.service.stop();

        let times: Vec<i64> = f
            .store
            .load_ordered()
            .unwrap()
            .into_iter()
            .map(|r| r.unwrap().acquisition_time)
            .collect();
        assert_eq!(times, vec![START + 2, START + 1, START]);
        assert!(!f.service.status().active);
    }

    #[tokio::test]
    async fn test_permission_denied_records_placeholder_and_stays_active() {
        let f = fixture();
        f.provider.set_permission_granted(false);

        assert!(f.service.start().unwrap());

        assert!(f.service.is_active());
        let snapshot = f.service.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.newest().unwrap().kind, FixKind::Placeholder);
        assert_eq!(snapshot.newest().unwrap().timestamp, START);
        f.service.stop();
    }

    #[tokio::test]
    async fn test_discard_history_clears_window_and_store() {
        let f = fixture();
        f.service.start().unwrap();
        f.provider.deliver_fix(RawFix::new(START, 45.0, 9.0, 0.0));
        wait_for_len(&f.service, 1).await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        f.service.register(Arc::new(move |s: &WindowSnapshot| sink.lock().push(s.len())));

        f.service.discard_history().unwrap();

        assert!(f.service.snapshot().is_empty());
        assert_eq!(f.store.count().unwrap(), 0);
        assert_eq!(*seen.lock(), vec![0]);
        f.service.stop();
    }

    #[tokio::test]
    async fn test_snapshot_from_before_discard_is_not_delivered_after_it() {
        let f = fixture();
        f.service.start().unwrap();
        f.provider.deliver_fix(RawFix::new(START, 45.0, 9.0, 0.0));
        wait_for_len(&f.service, 1).await;
        let before_discard = f.service.snapshot();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        f.service.register(Arc::new(move |s: &WindowSnapshot| sink.lock().push(s.len())));
        f.service.discard_history().unwrap();

        // An ingestion broadcast that lost the race with the discard
        let report = f.service.subscribers.broadcast(&before_discard);

        assert_eq!(report.superseded, 1);
        assert_eq!(*seen.lock(), vec![0]);
        f.service.stop();
    }

    #[test]
    fn test_discard_history_while_inactive_clears_store() {
        let f = fixture();
        f.store
            .insert(&StoredRecord::from_fix(&Fix::new(START, 45.0, 9.0, 0.0)))
            .unwrap();

        f.service.discard_history().unwrap();

        assert_eq!(f.store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_events_after_stop_are_dropped() {
        let f = fixture();
        f.service.start().unwrap();
        f.service.stop();

        assert!(!f.provider.deliver_fix(RawFix::new(START, 45.0, 9.0, 0.0)));
        assert!(f.service.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_eviction_uses_injected_clock() {
        let f = fixture();
        f.service.start().unwrap();
        f.provider.deliver_fix(RawFix::new(START, 45.0, 9.0, 0.0));
        wait_for_len(&f.service, 1).await;

        f.clock.advance(Duration::from_secs(301));
        f.provider
            .deliver_fix(RawFix::new(START + 301_000, 45.0, 9.0, 0.0));
        tokio::time::timeout(Duration::from_secs(2), async {
            while f.service.snapshot().newest().map(|x| x.timestamp) != Some(START + 301_000) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert_eq!(f.service.snapshot().len(), 1);
        f.service.stop();
    }
}
