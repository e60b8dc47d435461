//! Wall-clock sources and the version clock that stamps local writes

use crate::error::{Error, Result};
use crate::model::{Snapshot, Stamped};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock time in milliseconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// The system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) -> u64 {
        self.now.fetch_add(ms, Ordering::SeqCst) + ms
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Stamps entities and the snapshot on every local mutation.
///
/// Stamps never move backwards: an entity's `updatedAt` always advances
/// past its previous value, and `lastWriteTs` never decreases, even if the
/// wall clock steps back or two writes land in the same millisecond.
#[derive(Clone)]
pub struct VersionClock {
    clock: Arc<dyn Clock>,
}

impl VersionClock {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Set `updatedAt` on a touched entity
    pub fn stamp<E: Stamped + ?Sized>(&self, entity: &mut E) -> u64 {
        let previous = entity.updated_at();
        let ts = self.now().max(previous.saturating_add(1));
        entity.set_updated_at(ts);
        ts
    }

    /// Advance the snapshot version and write time
    pub fn bump(&self, snapshot: &mut Snapshot) -> Result<()> {
        snapshot.version = snapshot
            .version
            .checked_add(1)
            .ok_or(Error::VersionExhausted(snapshot.version))?;
        snapshot.last_write_ts = self.now().max(snapshot.last_write_ts);
        Ok(())
    }
}

impl Default for VersionClock {
    fn default() -> Self {
        Self::system()
    }
}

impl std::fmt::Debug for VersionClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionClock")
            .field("now", &self.now())
            .finish()
    }
}
