//! Error types for the sync layer

use thiserror::Error;

/// Errors surfaced to replica callers
///
/// Network failures of the background push never appear here; they are
/// reduced to a [`crate::SyncStatus`].
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Core(#[from] shelf_core::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] shelf_storage::StorageError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] shelf_transport::GatewayError),

    #[cfg(feature = "metrics")]
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
