//! Service error types.

use std::io;

use crate::store::StoreError;

/// Errors that can occur during service operations.
///
/// Provider, subscriber and write-through failures never surface here; the
/// service logs them and keeps running.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// `start()` was called outside a Tokio runtime.
    #[error("Tracking service must be started from within a Tokio runtime")]
    NoRuntime,

    /// The persistence writer thread could not be spawned.
    #[error("Failed to spawn persistence writer: {0}")]
    WriterSpawn(#[source] io::Error),

    /// A store operation the caller waits on failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
