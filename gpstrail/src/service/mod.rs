//! Tracking service: lifecycle of a location tracking session.
//!
//! [`TrackingService`] wires the retention window, the persistence writer,
//! the ingestion task and the subscriber registry around an injected
//! [`LocationStore`](crate::store::LocationStore) and
//! [`LocationProvider`](crate::provider::LocationProvider).
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use gpstrail::provider::ManualLocationProvider;
//! use gpstrail::service::{ServiceConfig, TrackingService};
//!
//! let config = ServiceConfig::default();
//! let service = Arc::new(TrackingService::open(config, Arc::new(ManualLocationProvider::new()))?);
//!
//! service.start()?;
//! let handle = service.handle();
//! println!("{} fixes retained", handle.snapshot().len());
//! service.stop();
//! ```

mod config;
mod error;
mod facade;
mod handle;
mod logger;

pub use config::{ServiceConfig, ServiceConfigBuilder, DEFAULT_WINDOW_LOG_INTERVAL};
pub use error::ServiceError;
pub use facade::{TrackingService, TrackingStatus};
pub use handle::{LocationHistory, TrackingHandle};
pub use logger::spawn_window_logger;
