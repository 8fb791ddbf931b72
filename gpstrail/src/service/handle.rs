//! Consumer-facing access to a running tracking service.
//!
//! UI layers and other consumers see the window through [`LocationHistory`]
//! rather than the service itself, so they cannot start or stop tracking.

use std::sync::Arc;

use crate::subscribers::WindowSubscriber;
use crate::window::WindowSnapshot;

use super::error::ServiceError;
use super::facade::{TrackingService, TrackingStatus};

/// Read and subscribe access to the retained location history.
pub trait LocationHistory: Send + Sync {
    /// Current window contents, newest first.
    fn snapshot(&self) -> WindowSnapshot;

    /// Add a subscriber. Returns false if it was already registered.
    fn register(&self, subscriber: Arc<dyn WindowSubscriber>) -> bool;

    /// Remove a subscriber. Returns false if it was not registered.
    fn unregister(&self, subscriber: &Arc<dyn WindowSubscriber>) -> bool;

    /// Empty the window and the store.
    fn discard_history(&self) -> Result<(), ServiceError>;

    /// Current service status.
    fn status(&self) -> TrackingStatus;
}

/// Cloneable handle to a [`TrackingService`].
#[derive(Debug, Clone)]
pub struct TrackingHandle {
    service: Arc<TrackingService>,
}

impl TrackingHandle {
    pub fn new(service: Arc<TrackingService>) -> Self {
        Self { service }
    }

    /// Whether a session is currently running.
    pub fn is_active(&self) -> bool {
        self.service.is_active()
    }
}

impl LocationHistory for TrackingHandle {
    fn snapshot(&self) -> WindowSnapshot {
        self.service.snapshot()
    }

    fn register(&self, subscriber: Arc<dyn WindowSubscriber>) -> bool {
        self.service.register(subscriber)
    }

    fn unregister(&self, subscriber: &Arc<dyn WindowSubscriber>) -> bool {
        self.service.unregister(subscriber)
    }

    fn discard_history(&self) -> Result<(), ServiceError> {
        self.service.discard_history()
    }

    fn status(&self) -> TrackingStatus {
        self.service.status()
    }
}

impl<T: LocationHistory + ?Sized> LocationHistory for Arc<T> {
    fn snapshot(&self) -> WindowSnapshot {
        (**self).snapshot()
    }

    fn register(&self, subscriber: Arc<dyn WindowSubscriber>) -> bool {
        (**self).register(subscriber)
    }

    fn unregister(&self, subscriber: &Arc<dyn WindowSubscriber>) -> bool {
        (**self).unregister(subscriber)
    }

    fn discard_history(&self) -> Result<(), ServiceError> {
        (**self).discard_history()
    }

    fn status(&self) -> TrackingStatus {
        (**self).status()
    }
}

impl TrackingService {
    /// Create a consumer handle for a shared service.
    pub fn handle(self: &Arc<Self>) -> TrackingHandle {
        TrackingHandle::new(Arc::clone(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ManualLocationProvider;
    use crate::service::ServiceConfig;
    use crate::store::{LocationStore, MemoryLocationStore, StoredRecord};
    use crate::fix::Fix;

    fn service() -> (Arc<TrackingService>, Arc<MemoryLocationStore>) {
        let store = Arc::new(MemoryLocationStore::new());
        let service = TrackingService::new(
            ServiceConfig::default(),
            store.clone(),
            Arc::new(ManualLocationProvider::new()),
        );
        (Arc::new(service), store)
    }

    fn count_snapshot_len(history: &dyn LocationHistory) -> usize {
        history.snapshot().len()
    }

    #[test]
    fn test_handle_forwards_to_service() {
        let (service, store) = service();
        store
            .insert(&StoredRecord::from_fix(&Fix::new(1_000, 45.0, 9.0, 0.0)))
            .unwrap();
        let handle = service.handle();

        assert_eq!(count_snapshot_len(&handle), 0);
        assert!(!handle.status().active);
        assert!(!handle.is_active());

        handle.discard_history().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_register_through_shared_handle() {
        let (service, _) = service();
        let history: Arc<dyn LocationHistory> = Arc::new(service.handle());
        let subscriber: Arc<dyn WindowSubscriber> = Arc::new(|_: &WindowSnapshot| {});

        assert!(history.register(Arc::clone(&subscriber)));
        assert!(!history.register(Arc::clone(&subscriber)));
        assert_eq!(service.subscriber_count(), 1);
        assert!(history.unregister(&subscriber));
        assert_eq!(service.subscriber_count(), 0);
    }
}
