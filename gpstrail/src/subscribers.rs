//! Subscriber registry and snapshot fan-out.
//!
//! Subscribers are capability values held by identity: the same
//! `Arc<dyn WindowSubscriber>` is registered at most once, and removing one
//! that is not registered is a no-op.
//!
//! Delivery is synchronous, in registration order, from the caller's
//! context. The registry lock is released before any subscriber runs, so a
//! subscriber may register or unregister (itself included) from inside its
//! callback. A subscriber that returns an error or panics is logged and
//! skipped; the remaining subscribers still receive the snapshot.
//!
//! Broadcasts are serialized and ordered by window revision. Once a snapshot
//! has started going out, an older one is no longer delivered, even if its
//! broadcast began first on another thread or was interrupted by a nested
//! broadcast from inside a callback.

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::broadcast;
use tracing::{error, trace, warn};

use crate::window::WindowSnapshot;

/// Error a subscriber may report while handling an update.
#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    /// The subscriber refused or failed to process the snapshot.
    #[error("subscriber rejected update: {0}")]
    Rejected(String),

    /// The subscriber's downstream consumer has gone away.
    #[error("subscriber disconnected")]
    Disconnected,
}

/// Receiver of window updates.
///
/// Closures of the form `Fn(&WindowSnapshot)` implement this trait directly.
pub trait WindowSubscriber: Send + Sync {
    /// Handle a post-eviction snapshot of the window.
    fn on_window_update(&self, snapshot: &WindowSnapshot) -> Result<(), SubscriberError>;
}

impl<F> WindowSubscriber for F
where
    F: Fn(&WindowSnapshot) + Send + Sync,
{
    fn on_window_update(&self, snapshot: &WindowSnapshot) -> Result<(), SubscriberError> {
        self(snapshot);
        Ok(())
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers that handled the snapshot.
    pub delivered: usize,
    /// Subscribers that returned an error or panicked.
    pub failed: usize,
    /// Subscribers skipped because a newer snapshot had already gone out.
    pub superseded: usize,
}

/// Thread-safe set of subscribers, kept in registration order.
pub struct SubscriberRegistry {
    subscribers: Mutex<Vec<Arc<dyn WindowSubscriber>>>,
    /// Held for the whole of a broadcast; records the newest revision sent.
    delivery: ReentrantMutex<Cell<u64>>,
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            delivery: ReentrantMutex::new(Cell::new(0)),
        }
    }
}

impl SubscriberRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. Returns false if it was already registered.
    pub fn register(&self, subscriber: Arc<dyn WindowSubscriber>) -> bool {
        let mut subscribers = self.subscribers.lock();
        if subscribers.iter().any(|s| same_subscriber(s, &subscriber)) {
            return false;
        }
        subscribers.push(subscriber);
        true
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub fn unregister(&self, subscriber: &Arc<dyn WindowSubscriber>) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|s| !same_subscriber(s, subscriber));
        subscribers.len() != before
    }

    /// Check whether a subscriber is registered.
    pub fn contains(&self, subscriber: &Arc<dyn WindowSubscriber>) -> bool {
        self.subscribers
            .lock()
            .iter()
            .any(|s| same_subscriber(s, subscriber))
    }

    /// Drop every subscriber.
    pub fn clear(&self) {
        self.subscribers.lock().clear();
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// True when nobody is registered.
    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }

    /// Deliver a snapshot to every subscriber registered at call time.
    ///
    /// Subscribers not yet reached when a newer snapshot goes out are
    /// skipped and counted in [`BroadcastReport::superseded`].
    pub fn broadcast(&self, snapshot: &WindowSnapshot) -> BroadcastReport {
        let delivery = self.delivery.lock();
        let revision = snapshot.revision();
        let targets: Vec<Arc<dyn WindowSubscriber>> = self.subscribers.lock().clone();
        let mut report = BroadcastReport::default();

        if revision != 0 {
            delivery.set(delivery.get().max(revision));
        }

        for (position, subscriber) in targets.iter().enumerate() {
            if revision != 0 && revision < delivery.get() {
                report.superseded = targets.len() - position;
                trace!(
                    revision,
                    latest = delivery.get(),
                    "Dropping snapshot superseded by a newer one"
                );
                break;
            }

            let outcome = catch_unwind(AssertUnwindSafe(|| {
                subscriber.on_window_update(snapshot)
            }));

            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(position, error = %e, "Subscriber failed to handle update");
                }
                Err(_) => {
                    report.failed += 1;
                    error!(position, "Subscriber panicked while handling update");
                }
            }
        }

        trace!(
            delivered = report.delivered,
            failed = report.failed,
            superseded = report.superseded,
            fixes = snapshot.len(),
            "Broadcast window snapshot"
        );
        report
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.len())
            .finish()
    }
}

fn same_subscriber(a: &Arc<dyn WindowSubscriber>, b: &Arc<dyn WindowSubscriber>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Subscriber that forwards snapshots into a tokio broadcast channel.
///
/// Lets async consumers receive updates with `recv().await` instead of a
/// callback.
///
/// ```ignore
/// let (broadcaster, mut rx) = SnapshotBroadcaster::channel(16);
/// handle.register(Arc::new(broadcaster));
/// while let Ok(snapshot) = rx.recv().await {
///     // redraw
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SnapshotBroadcaster {
    tx: broadcast::Sender<WindowSnapshot>,
}

impl SnapshotBroadcaster {
    /// Create a broadcaster and its first receiver.
    pub fn channel(capacity: usize) -> (Self, broadcast::Receiver<WindowSnapshot>) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Attach another receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<WindowSnapshot> {
        self.tx.subscribe()
    }
}

impl WindowSubscriber for SnapshotBroadcaster {
    fn on_window_update(&self, snapshot: &WindowSnapshot) -> Result<(), SubscriberError> {
        self.tx
            .send(snapshot.clone())
            .map(|_| ())
            .map_err(|_| SubscriberError::Disconnected)
    }
}
