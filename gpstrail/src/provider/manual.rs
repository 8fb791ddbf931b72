//! In-process provider driven by the embedding application.
//!
//! [`ManualLocationProvider`] holds the channel handed over by the tracking
//! service and lets the owner push fixes, batches and availability changes
//! into it. Platform glue that receives fixes from a native SDK callback can
//! forward them here; tests use it to script provider behavior.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::types::{LocationProvider, LocationRequest, ProviderError, ProviderEvent, RawFix};

struct Subscription {
    request: LocationRequest,
    events: mpsc::Sender<ProviderEvent>,
}

/// Provider whose events are pushed by hand.
pub struct ManualLocationProvider {
    subscription: Mutex<Option<Subscription>>,
    permission_granted: AtomicBool,
    delivered: AtomicU64,
    rejected: AtomicU64,
}

impl Default for ManualLocationProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualLocationProvider {
    /// Create a provider with location permission granted.
    pub fn new() -> Self {
        Self {
            subscription: Mutex::new(None),
            permission_granted: AtomicBool::new(true),
            delivered: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Grant or revoke location permission for future subscriptions.
    pub fn set_permission_granted(&self, granted: bool) {
        self.permission_granted.store(granted, Ordering::SeqCst);
    }

    /// The request of the active subscription, if any.
    pub fn active_request(&self) -> Option<LocationRequest> {
        self.subscription
            .lock()
            .as_ref()
            .map(|s| s.request.clone())
    }

    /// True while a consumer is subscribed.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.lock().is_some()
    }

    /// Deliver one fix. Returns false if nobody is subscribed or the
    /// consumer's buffer is full.
    pub fn deliver_fix(&self, fix: RawFix) -> bool {
        self.deliver(ProviderEvent::Locations(vec![fix]))
    }

    /// Deliver a batch of fixes in one result.
    pub fn deliver_batch(&self, fixes: Vec<RawFix>) -> bool {
        self.deliver(ProviderEvent::Locations(fixes))
    }

    /// Signal that no location can currently be produced.
    pub fn signal_unavailable(&self) -> bool {
        self.deliver(ProviderEvent::Availability { available: false })
    }

    /// Signal that locations are available again.
    pub fn signal_available(&self) -> bool {
        self.deliver(ProviderEvent::Availability { available: true })
    }

    /// Events accepted into the consumer channel so far.
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Events that could not be delivered.
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    fn deliver(&self, event: ProviderEvent) -> bool {
        let subscription = self.subscription.lock();
        let Some(subscription) = subscription.as_ref() else {
            trace!("No subscriber for provider event, dropping");
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        match subscription.events.try_send(event) {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                warn!(error = %e, "Provider event not delivered");
                self.rejected.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

impl LocationProvider for ManualLocationProvider {
    fn request_location_updates(
        &self,
        request: &LocationRequest,
        events: mpsc::Sender<ProviderEvent>,
    ) -> Result<(), ProviderError> {
        if !self.permission_granted.load(Ordering::SeqCst) {
            return Err(ProviderError::PermissionDenied);
        }

        let mut subscription = self.subscription.lock();
        if subscription.is_some() {
            return Err(ProviderError::AlreadySubscribed);
        }

        debug!(
            interval_ms = request.interval.as_millis() as u64,
            priority = %request.priority,
            "Location updates requested"
        );
        *subscription = Some(Subscription {
            request: request.clone(),
            events,
        });
        Ok(())
    }

    fn remove_location_updates(&self) {
        if self.subscription.lock().take().is_some() {
            debug!("Location updates removed");
        }
    }
}
