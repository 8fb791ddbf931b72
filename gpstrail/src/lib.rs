//! gpstrail - rolling location history with crash-safe persistence
//!
//! This library keeps a short, time-bounded history of location fixes
//! delivered by a positioning provider. Every fix is written through to a
//! local store, and the history is rebuilt from the store when tracking
//! restarts.
//!
//! # High-Level API
//!
//! For most use cases, the [`service`] module provides a simplified facade:
//!
//! ```ignore
//! use std::sync::Arc;
//! use gpstrail::provider::ManualLocationProvider;
//! use gpstrail::service::{ServiceConfig, TrackingService};
//!
//! let provider = Arc::new(ManualLocationProvider::new());
//! let service = TrackingService::open(ServiceConfig::default(), provider)?;
//!
//! service.start()?;
//! let snapshot = service.snapshot();
//! ```

pub mod config;
pub mod fix;
pub mod ingest;
pub mod logging;
pub mod provider;
pub mod recovery;
pub mod service;
pub mod store;
pub mod subscribers;
pub mod time;
pub mod window;

/// Version of the gpstrail library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
