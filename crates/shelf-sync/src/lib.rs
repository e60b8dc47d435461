//! Shelf Sync
//!
//! Keeps a local inventory replica consistent with one remote copy:
//!
//! - [`Replica`]: the handle applications hold. Edits are persisted locally
//!   first and pushed after a debounce window.
//! - [`SyncScheduler`]: serializes pushes and pulls behind one `syncing`
//!   flag, retries failed pushes and publishes a [`SyncStatus`].
//! - [`DebounceTimer`] and [`RetryPolicy`]: the timing pieces.
//!
//! ```no_run
//! use shelf_core::{ItemDraft, TxKind};
//! use shelf_storage::SqliteStore;
//! use shelf_sync::{Replica, SyncConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::new().with_endpoint("https://example.com/exec");
//! let gateway = config.gateway()?;
//! let store = Arc::new(SqliteStore::new("replica.db")?);
//! let replica = Replica::open(store, gateway, config).await?;
//!
//! replica.upsert_item(ItemDraft::new("A1", "Widget").stock_init(12.0)).await?;
//! replica.record_transaction("A1", TxKind::Out, 2.0, 4.5).await?;
//! replica.flush().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod replica;
pub mod retry;
pub mod scheduler;
pub mod status;
pub mod timer;

pub use config::{SyncConfig, DEFAULT_DEBOUNCE, DEFAULT_PULL_INTERVAL};
pub use error::{SyncError, SyncResult};
#[cfg(feature = "metrics")]
pub use metrics::SyncMetrics;
pub use replica::Replica;
pub use retry::{Backoff, RetryPolicy};
pub use scheduler::SyncScheduler;
pub use status::{
    FailureKind, Operation, PushState, SyncFailure, SyncOutcome, SyncReport, SyncStats,
    SyncStatus,
};
pub use timer::DebounceTimer;
