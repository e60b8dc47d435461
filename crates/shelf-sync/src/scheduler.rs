//! Push and pull scheduling
//!
//! Two tracks share one `syncing` flag. A request that arrives while the
//! flag is set is dropped and reported as skipped:
//!
//! - push: `Idle -> Debouncing -> Pushing -> Idle`. Every local edit
//!   restarts the debounce timer; retryable failures are retried per the
//!   [`RetryPolicy`](crate::RetryPolicy), then the failure is recorded.
//! - pull: manual or periodic. The remote snapshot is merged with the
//!   persisted one and written back; on any error nothing is written.

#[cfg(feature = "metrics")]
use crate::metrics::SyncMetrics;
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::status::{Operation, PushState, SyncFailure, SyncOutcome, SyncStats, SyncStatus};
use crate::timer::DebounceTimer;
use parking_lot::Mutex;
use shelf_core::{Clock, MergeEngine, MergeReport, Snapshot};
use shelf_storage::{LocalStore, StorageError};
use shelf_transport::RemoteGateway;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// The cached snapshot and the store behind it
pub(crate) struct ReplicaState {
    pub(crate) snapshot: tokio::sync::Mutex<Snapshot>,
    pub(crate) store: Arc<dyn LocalStore>,
}

/// Holds the `syncing` flag for the lifetime of one operation
struct SyncGuard<'a>(&'a AtomicBool);

impl<'a> SyncGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncGuard(flag))
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Serializes pushes and pulls for one replica
pub struct SyncScheduler {
    state: Arc<ReplicaState>,
    gateway: Arc<dyn RemoteGateway>,
    engine: MergeEngine,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    syncing: AtomicBool,
    push_timer: DebounceTimer,
    pull_task: Mutex<Option<JoinHandle<()>>>,
    status: watch::Sender<SyncStatus>,
    stats: Mutex<SyncStats>,
    #[cfg(feature = "metrics")]
    metrics: SyncMetrics,
}

impl SyncScheduler {
    pub(crate) fn new(
        state: Arc<ReplicaState>,
        gateway: Arc<dyn RemoteGateway>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> SyncResult<Self> {
        let engine = MergeEngine::new(clock.clone()).with_tie_break(config.tie_break);
        let (status, _) = watch::channel(SyncStatus::default());

        Ok(Self {
            state,
            gateway,
            engine,
            clock,
            config,
            syncing: AtomicBool::new(false),
            push_timer: DebounceTimer::new(),
            pull_task: Mutex::new(None),
            status,
            stats: Mutex::new(SyncStats::default()),
            #[cfg(feature = "metrics")]
            metrics: SyncMetrics::new()?,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Receive every status change
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub fn stats(&self) -> SyncStats {
        self.stats.lock().clone()
    }

    #[cfg(feature = "metrics")]
    pub fn metrics(&self) -> &SyncMetrics {
        &self.metrics
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Whether a debounced push is waiting to fire
    pub fn has_pending_push(&self) -> bool {
        self.push_timer.is_pending()
    }

    /// (Re)start the debounce window; only the last scheduled push fires
    pub fn schedule_push(self: &Arc<Self>) {
        if !self.config.auto_push {
            return;
        }

        let weak = Arc::downgrade(self);
        let superseded = self.push_timer.reschedule(self.config.debounce, async move {
            if let Some(scheduler) = weak.upgrade() {
                scheduler.run_push().await;
            }
        });

        if superseded {
            self.stats.lock().coalesced += 1;
        }
        self.update_status(|s| {
            if s.push != PushState::Pushing {
                s.push = PushState::Debouncing;
            }
        });
        debug!(debounce_ms = self.config.debounce.as_millis() as u64, "Push scheduled");
    }

    /// Push right away, dropping any pending debounce timer
    pub async fn push_now(&self) -> SyncOutcome {
        if self.is_syncing() {
            return self.skip(Operation::Push);
        }
        self.push_timer.cancel();
        self.run_push().await
    }

    /// Wait for an in-flight operation, then push if a push is pending
    pub async fn flush(&self) -> Option<SyncOutcome> {
        let mut rx = self.status.subscribe();
        let _ = rx.wait_for(|s| !s.syncing).await;

        if self.push_timer.cancel() {
            Some(self.run_push().await)
        } else {
            None
        }
    }

    pub(crate) async fn run_push(&self) -> SyncOutcome {
        let Some(guard) = SyncGuard::acquire(&self.syncing) else {
            return self.skip(Operation::Push);
        };

        let started = Instant::now();
        self.update_status(|s| {
            s.push = PushState::Pushing;
            s.syncing = true;
        });

        let snapshot = self.state.snapshot.lock().await.clone();
        info!(
            version = snapshot.version,
            items = snapshot.items.len(),
            transactions = snapshot.transactions.len(),
            "Pushing snapshot"
        );

        let mut attempt = 1;
        let result = loop {
            match self.gateway.push(&snapshot).await {
                Ok(ack) => break Ok(ack),
                Err(e) => match self.config.retry.delay_for(attempt).filter(|_| e.is_retryable()) {
                    Some(delay) => {
                        warn!(
                            attempt,
                            error = %e,
                            delay_ms = delay.as_millis() as u64,
                            "Push failed, retrying"
                        );
                        self.note_retry();
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => break Err(e),
                },
            }
        };

        let now = self.clock.now_ms();
        let outcome = match result {
            Ok(ack) => {
                info!(version = snapshot.version, attempts = attempt, ack = %ack.excerpt(), "Push completed");
                self.stats.lock().pushes += 1;
                SyncOutcome::Completed {
                    version: snapshot.version,
                }
            }
            Err(e) => {
                error!(attempts = attempt, kind = e.kind(), error = %e, "Push failed");
                self.stats.lock().push_failures += 1;
                SyncOutcome::Failed(SyncFailure::from_gateway(Operation::Push, &e, now))
            }
        };

        drop(guard);
        self.finish(Operation::Push, &outcome, started.elapsed(), now);
        outcome
    }

    /// Fetch the remote snapshot and merge it into the local one
    pub async fn pull_now(&self) -> SyncOutcome {
        let Some(guard) = SyncGuard::acquire(&self.syncing) else {
            return self.skip(Operation::Pull);
        };

        let started = Instant::now();
        self.update_status(|s| s.syncing = true);
        debug!("Pulling remote snapshot");

        let outcome = match self.gateway.pull().await {
            Ok(remote) => self.apply_remote(&remote).await,
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "Pull failed, local replica untouched");
                SyncOutcome::Failed(SyncFailure::from_gateway(
                    Operation::Pull,
                    &e,
                    self.clock.now_ms(),
                ))
            }
        };

        {
            let mut stats = self.stats.lock();
            if outcome.is_completed() {
                stats.pulls += 1;
            } else {
                stats.pull_failures += 1;
            }
        }

        drop(guard);
        self.finish(Operation::Pull, &outcome, started.elapsed(), self.clock.now_ms());
        outcome
    }

    async fn apply_remote(&self, remote: &Snapshot) -> SyncOutcome {
        let mut cache = self.state.snapshot.lock().await;

        match self.merge_into_store(remote).await {
            Ok((merged, report)) => {
                info!(
                    version = merged.version,
                    items = merged.items.len(),
                    transactions = merged.transactions.len(),
                    items_from_remote = report.items.remote_only + report.items.remote_won,
                    branding_from_remote = report.branding_from_remote,
                    "Pull merged"
                );
                let version = merged.version;
                *cache = merged;
                self.note_local_write();
                SyncOutcome::Completed { version }
            }
            Err(e) => {
                error!(error = %e, "Could not apply pulled snapshot");
                SyncOutcome::Failed(SyncFailure::from_storage(
                    Operation::Pull,
                    &e,
                    self.clock.now_ms(),
                ))
            }
        }
    }

    async fn merge_into_store(
        &self,
        remote: &Snapshot,
    ) -> Result<(Snapshot, MergeReport), StorageError> {
        let local = self.state.store.load().await?;
        let (merged, report) = self.engine.merge_with_report(&local, remote);
        self.state.store.replace(&merged).await?;
        Ok((merged, report))
    }

    /// Pull every `period`, first after one period has elapsed
    pub fn start_periodic_pull(self: &Arc<Self>, period: Duration) {
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(scheduler) = weak.upgrade() else {
                    break;
                };
                scheduler.pull_now().await;
            }
        });

        info!(period_secs = period.as_secs_f64(), "Periodic pull started");
        if let Some(previous) = self.pull_task.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Returns true if a periodic pull was running
    pub fn stop_periodic_pull(&self) -> bool {
        match self.pull_task.lock().take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    fn skip(&self, op: Operation) -> SyncOutcome {
        info!(operation = %op, "Sync in progress, request skipped");
        self.stats.lock().skipped += 1;
        #[cfg(feature = "metrics")]
        self.metrics.record(op, "skipped", Duration::ZERO);

        if op == Operation::Push {
            let pending = self.push_timer.is_pending();
            self.update_status(|s| {
                if s.push == PushState::Debouncing && !pending {
                    s.push = PushState::Idle;
                }
            });
        }
        SyncOutcome::Skipped
    }

    fn finish(&self, op: Operation, outcome: &SyncOutcome, elapsed: Duration, now: u64) {
        #[cfg(feature = "metrics")]
        self.metrics.record(op, outcome.label(), elapsed);
        #[cfg(not(feature = "metrics"))]
        let _ = elapsed;

        let pending = self.push_timer.is_pending();
        self.update_status(|s| {
            s.syncing = false;
            if op == Operation::Push {
                s.push = if pending {
                    PushState::Debouncing
                } else {
                    PushState::Idle
                };
            }

            match outcome {
                SyncOutcome::Completed { .. } => {
                    match op {
                        Operation::Push => s.last_push = Some(now),
                        Operation::Pull => s.last_pull = Some(now),
                    }
                    if s.last_error.as_ref().map_or(false, |e| e.op == op) {
                        s.last_error = None;
                    }
                }
                SyncOutcome::Failed(failure) => s.last_error = Some(failure.clone()),
                SyncOutcome::Skipped => {}
            }
        });
    }

    fn note_retry(&self) {
        self.stats.lock().retries += 1;
        #[cfg(feature = "metrics")]
        self.metrics.retries_total.inc();
    }

    pub(crate) fn note_local_write(&self) {
        #[cfg(feature = "metrics")]
        self.metrics.local_writes_total.inc();
    }

    fn update_status(&self, f: impl FnOnce(&mut SyncStatus)) {
        self.status.send_modify(f);
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.pull_task.get_mut().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("config", &self.config)
            .field("syncing", &self.is_syncing())
            .field("status", &*self.status.borrow())
            .finish()
    }
}
