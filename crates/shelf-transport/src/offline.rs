//! Gateway for replicas with no remote

use crate::{GatewayError, GatewayResult, RemoteGateway};
use async_trait::async_trait;
use shelf_core::Snapshot;
use shelf_protocol::Ack;

/// Every round trip fails with a transport error
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineGateway;

#[async_trait]
impl RemoteGateway for OfflineGateway {
    async fn push(&self, _snapshot: &Snapshot) -> GatewayResult<Ack> {
        Err(GatewayError::transport("no remote endpoint configured"))
    }

    async fn pull(&self) -> GatewayResult<Snapshot> {
        Err(GatewayError::transport("no remote endpoint configured"))
    }
}
