//! Shelf Transport Layer
//!
//! Adapters between a replica and its single remote copy:
//! - HTTP: form POST for save, query GET for load (default feature)
//! - Memory: an in-process remote with scripted failures, for tests
//! - Offline: a gateway for replicas with no remote configured

pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod memory;
pub mod offline;

use async_trait::async_trait;
use shelf_core::Snapshot;
use shelf_protocol::Ack;

pub use error::{GatewayError, GatewayResult};
#[cfg(feature = "http")]
pub use http::HttpGateway;
pub use memory::MemoryGateway;
pub use offline::OfflineGateway;

/// Remote gateway trait
///
/// Each call is a single round trip. A failed push must not be assumed to
/// have changed remote state; a failed pull yields no snapshot at all.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Send the full snapshot to the remote
    async fn push(&self, snapshot: &Snapshot) -> GatewayResult<Ack>;

    /// Fetch and validate the remote snapshot
    async fn pull(&self) -> GatewayResult<Snapshot>;
}
