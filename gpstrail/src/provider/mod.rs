//! Positioning provider boundary.
//!
//! The raw positioning SDK is an external collaborator. This module defines
//! what the tracking core needs from it:
//!
//! - [`LocationProvider`] - subscribe/unsubscribe with a [`LocationRequest`]
//! - [`ProviderEvent`] - fixes ([`RawFix`]) and availability changes pushed
//!   over a bounded `tokio::sync::mpsc` channel
//! - [`ManualLocationProvider`] - in-process provider fed by the embedding
//!   application
//!
//! # Example
//!
//! ```ignore
//! use gpstrail::provider::{LocationProvider, LocationRequest, ManualLocationProvider, RawFix};
//!
//! let provider = ManualLocationProvider::new();
//! let (tx, mut rx) = tokio::sync::mpsc::channel(16);
//! provider.request_location_updates(&LocationRequest::default(), tx)?;
//!
//! provider.deliver_fix(RawFix::new(now_ms, 45.4642, 9.1900, 122.0));
//! provider.signal_unavailable();
//! ```

mod manual;
mod types;

pub use manual::ManualLocationProvider;
pub use types::{
    LocationPriority, LocationProvider, LocationRequest, ProviderError, ProviderEvent, RawFix,
    DEFAULT_UPDATE_INTERVAL,
};
