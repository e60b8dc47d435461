//! Shelf Local Stores
//!
//! Durable holders of the current replica snapshot:
//! - Memory: volatile, for tests and demos
//! - SQLite: embedded persistence across restarts
//!
//! A store keeps exactly one record, the serialized snapshot, under
//! [`STORAGE_KEY`]. Nothing persisted reads as an empty snapshot; a record
//! that does not decode is an error.

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use shelf_core::Snapshot;

/// Fixed identifier of the persisted replica record
pub const STORAGE_KEY: &str = "shelf_replica_v1";

/// Local store trait
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Load the persisted snapshot, or an empty one on first use
    async fn load(&self) -> Result<Snapshot, StorageError>;

    /// Persist the snapshot as-is, replacing the previous record
    async fn replace(&self, snapshot: &Snapshot) -> Result<(), StorageError>;

    /// Raw bytes of the persisted record, if any
    async fn raw(&self) -> Result<Option<Vec<u8>>, StorageError>;
}

/// Storage error types
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<shelf_core::Error> for StorageError {
    fn from(e: shelf_core::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

pub(crate) fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, StorageError> {
    Ok(snapshot.to_json_vec()?)
}

pub(crate) fn decode(key: &str, bytes: &[u8]) -> Result<Snapshot, StorageError> {
    Snapshot::from_json_slice(bytes).map_err(|e| {
        tracing::error!(key, error = %e, "Persisted replica record is corrupt");
        StorageError::Serialization(format!("{}: {}", key, e))
    })
}

#[cfg(feature = "memory")]
pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
