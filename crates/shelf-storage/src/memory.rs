//! In-memory local store

use crate::{decode, encode, LocalStore, StorageError, STORAGE_KEY};
use async_trait::async_trait;
use dashmap::DashMap;
use shelf_core::Snapshot;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory local store
///
/// Keeps the encoded record exactly as a durable store would, so decode
/// failures and byte-level comparisons behave the same. Data is lost when
/// the process exits.
pub struct MemoryStore {
    records: DashMap<String, Vec<u8>>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            writes: AtomicU64::new(0),
        }
    }

    /// Start from an already persisted snapshot
    pub fn with_snapshot(snapshot: &Snapshot) -> Result<Self, StorageError> {
        let store = Self::new();
        store.records.insert(STORAGE_KEY.to_string(), encode(snapshot)?);
        Ok(store)
    }

    /// Overwrite the record with arbitrary bytes
    pub fn put_raw(&self, bytes: impl Into<Vec<u8>>) {
        self.records.insert(STORAGE_KEY.to_string(), bytes.into());
    }

    /// Number of successful `replace` calls
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn load(&self) -> Result<Snapshot, StorageError> {
        match self.records.get(STORAGE_KEY) {
            Some(entry) => decode(STORAGE_KEY, entry.value()),
            None => Ok(Snapshot::new()),
        }
    }

    async fn replace(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let bytes = encode(snapshot)?;
        self.records.insert(STORAGE_KEY.to_string(), bytes);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn raw(&self) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.records.get(STORAGE_KEY).map(|e| e.value().clone()))
    }
}
