//! The replica handle
//!
//! A [`Replica`] owns the cached snapshot, its local store, the remote
//! gateway and the scheduler. Every mutation follows the same path: apply
//! the edit to a copy, stamp the touched entity, bump the snapshot version,
//! persist the copy, swap it in, then schedule a debounced push. If any step
//! before the swap fails the replica is left as it was.

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::scheduler::{ReplicaState, SyncScheduler};
use crate::status::{SyncOutcome, SyncReport, SyncStats, SyncStatus};
use shelf_core::{
    Clock, Item, ItemDraft, LowStock, Snapshot, SystemClock, Transaction, TxKind, VersionClock,
};
use shelf_storage::LocalStore;
use shelf_transport::RemoteGateway;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Handle to one local replica
pub struct Replica {
    state: Arc<ReplicaState>,
    scheduler: Arc<SyncScheduler>,
    clock: VersionClock,
}

impl Replica {
    /// Open the replica persisted in `store`, using the system clock
    pub async fn open(
        store: Arc<dyn LocalStore>,
        gateway: Arc<dyn RemoteGateway>,
        config: SyncConfig,
    ) -> SyncResult<Self> {
        Self::open_with_clock(store, gateway, config, Arc::new(SystemClock)).await
    }

    pub async fn open_with_clock(
        store: Arc<dyn LocalStore>,
        gateway: Arc<dyn RemoteGateway>,
        config: SyncConfig,
        clock: Arc<dyn Clock>,
    ) -> SyncResult<Self> {
        let snapshot = store.load().await?;
        info!(
            version = snapshot.version,
            items = snapshot.items.len(),
            transactions = snapshot.transactions.len(),
            "Replica opened"
        );

        let state = Arc::new(ReplicaState {
            snapshot: tokio::sync::Mutex::new(snapshot),
            store,
        });
        let pull_interval = config.pull_interval;
        let scheduler = Arc::new(SyncScheduler::new(
            state.clone(),
            gateway,
            clock.clone(),
            config,
        )?);

        if let Some(period) = pull_interval {
            scheduler.start_periodic_pull(period);
        }

        Ok(Self {
            state,
            scheduler,
            clock: VersionClock::new(clock),
        })
    }

    /// A copy of the current snapshot
    pub async fn snapshot(&self) -> Snapshot {
        self.state.snapshot.lock().await.clone()
    }

    /// Run a read-only query against the current snapshot
    pub async fn read<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> R {
        f(&*self.state.snapshot.lock().await)
    }

    pub async fn stock_of(&self, sku: &str) -> f64 {
        self.read(|s| s.stock_of(sku)).await
    }

    pub async fn low_stock(&self, threshold: f64) -> Vec<LowStock> {
        self.read(|s| s.low_stock(threshold)).await
    }

    pub async fn find_by_barcode(&self, code: &str) -> Option<Item> {
        self.read(|s| s.find_by_barcode(code).cloned()).await
    }

    // Mutations

    /// Create or update an item
    pub async fn upsert_item(&self, draft: ItemDraft) -> SyncResult<Item> {
        self.mutate(|s, clock| s.upsert_item(draft, clock).cloned())
            .await
    }

    /// Point `code` at `sku`, creating a placeholder item if needed
    pub async fn assign_barcode(&self, code: &str, sku: &str) -> SyncResult<Item> {
        self.mutate(|s, clock| s.assign_barcode(code, sku, clock).cloned())
            .await
    }

    pub async fn record_transaction(
        &self,
        sku: &str,
        kind: TxKind,
        qty: f64,
        price: f64,
    ) -> SyncResult<Transaction> {
        self.mutate(|s, clock| s.record_transaction(sku, kind, qty, price, clock).cloned())
            .await
    }

    /// Record a transaction for the item a scanned code resolves to
    pub async fn record_scan(
        &self,
        code: &str,
        kind: TxKind,
        qty: f64,
        price: f64,
    ) -> SyncResult<Transaction> {
        self.mutate(|s, clock| s.record_scan(code, kind, qty, price, clock).cloned())
            .await
    }

    pub async fn confirm_transaction(
        &self,
        id: &str,
        price: Option<f64>,
    ) -> SyncResult<Transaction> {
        self.mutate(|s, clock| s.confirm_transaction(id, price, clock).cloned())
            .await
    }

    pub async fn set_company_name(&self, name: &str) -> SyncResult<()> {
        self.mutate(|s, _| {
            s.set_company_name(name);
            Ok(())
        })
        .await
    }

    /// Set or clear the logo data URL
    pub async fn set_logo(&self, logo: Option<String>) -> SyncResult<()> {
        self.mutate(|s, _| {
            s.set_logo(logo);
            Ok(())
        })
        .await
    }

    async fn mutate<R>(
        &self,
        edit: impl FnOnce(&mut Snapshot, &VersionClock) -> shelf_core::Result<R>,
    ) -> SyncResult<R> {
        let mut cache = self.state.snapshot.lock().await;

        let mut next = cache.clone();
        let out = edit(&mut next, &self.clock)?;
        self.clock.bump(&mut next)?;
        self.state.store.replace(&next).await?;

        debug!(version = next.version, "Local edit persisted");
        *cache = next;
        drop(cache);

        self.scheduler.note_local_write();
        self.scheduler.schedule_push();
        Ok(out)
    }

    // Sync

    /// Pull and merge now
    pub async fn pull_now(&self) -> SyncOutcome {
        self.scheduler.pull_now().await
    }

    /// Push now, superseding a pending debounced push
    pub async fn push_now(&self) -> SyncOutcome {
        self.scheduler.push_now().await
    }

    /// Push, then pull
    pub async fn sync_now(&self) -> SyncReport {
        let push = self.scheduler.push_now().await;
        let pull = self.scheduler.pull_now().await;
        SyncReport { push, pull }
    }

    /// Send a pending debounced push immediately; used before shutdown
    pub async fn flush(&self) -> Option<SyncOutcome> {
        self.scheduler.flush().await
    }

    pub fn start_periodic_pull(&self, period: Duration) {
        self.scheduler.start_periodic_pull(period);
    }

    pub fn stop_periodic_pull(&self) -> bool {
        self.scheduler.stop_periodic_pull()
    }

    pub fn status(&self) -> SyncStatus {
        self.scheduler.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.scheduler.subscribe()
    }

    pub fn stats(&self) -> SyncStats {
        self.scheduler.stats()
    }

    pub fn scheduler(&self) -> &Arc<SyncScheduler> {
        &self.scheduler
    }

    #[cfg(feature = "metrics")]
    pub fn metrics(&self) -> &crate::metrics::SyncMetrics {
        self.scheduler.metrics()
    }
}

impl Drop for Replica {
    fn drop(&mut self) {
        self.scheduler.stop_periodic_pull();
    }
}

impl std::fmt::Debug for Replica {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replica")
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_core::ManualClock;
    use shelf_storage::MemoryStore;
    use shelf_transport::MemoryGateway;

    async fn open(store: Arc<MemoryStore>) -> Replica {
        let config = SyncConfig::default().with_auto_push(false);
        Replica::open_with_clock(
            store,
            Arc::new(MemoryGateway::new()),
            config,
            Arc::new(ManualClock::new(5_000)),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_mutation_stamps_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let replica = open(store.clone()).await;

        let item = replica
            .upsert_item(ItemDraft::new("A1", "Widget").stock_init(10.0))
            .await
            .unwrap();
        assert_eq!(item.updated_at, 5_000);

        let snap = replica.snapshot().await;
        assert_eq!(snap.version, 1);
        assert_eq!(snap.last_write_ts, 5_000);
        assert_eq!(store.load().await.unwrap(), snap);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_failed_edit_leaves_replica_untouched() {
        let store = Arc::new(MemoryStore::new());
        let replica = open(store.clone()).await;

        assert!(replica
            .record_transaction("A1", TxKind::In, 0.0, 0.0)
            .await
            .is_err());
        assert!(replica.upsert_item(ItemDraft::new("", "x")).await.is_err());

        assert_eq!(replica.snapshot().await.version, 0);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_queries() {
        let replica = open(Arc::new(MemoryStore::new())).await;
        replica
            .upsert_item(ItemDraft::new("A1", "Widget").stock_init(10.0))
            .await
            .unwrap();
        replica.assign_barcode("800123", "A1").await.unwrap();
        replica
            .record_scan("800123", TxKind::Out, 7.0, 2.0)
            .await
            .unwrap();

        assert_eq!(replica.stock_of("A1").await, 3.0);
        assert_eq!(replica.low_stock(4.0).await.len(), 1);
        assert_eq!(
            replica.find_by_barcode("800123").await.map(|i| i.sku),
            Some("A1".to_string())
        );
    }

    #[tokio::test]
    async fn test_corrupt_store_fails_open() {
        let store = Arc::new(MemoryStore::new());
        store.put_raw(b"garbage".to_vec());

        let result = Replica::open(
            store,
            Arc::new(MemoryGateway::new()),
            SyncConfig::default(),
        )
        .await;
        assert!(matches!(result, Err(crate::SyncError::Storage(_))));
    }
}
