//! In-memory remote
//!
//! Behaves like the HTTP remote without a network: requests go through the
//! same save/load encoding, the stored body is returned verbatim on load,
//! and failures can be scripted per operation.

use crate::{GatewayError, GatewayResult, RemoteGateway};
use async_trait::async_trait;
use parking_lot::Mutex;
use shelf_core::Snapshot;
use shelf_protocol::{decode_snapshot, encode_snapshot, Ack, Request};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Default)]
struct RemoteState {
    body: Option<String>,
    push_failures: VecDeque<GatewayError>,
    pull_failures: VecDeque<GatewayError>,
}

/// An in-process remote copy
#[derive(Default)]
pub struct MemoryGateway {
    state: Mutex<RemoteState>,
    required_key: Option<String>,
    client_key: Option<String>,
    latency: Option<Duration>,
    pushes: AtomicU64,
    pulls: AtomicU64,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require this shared secret on every request, and send it
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.required_key = Some(key.clone());
        self.client_key = Some(key);
        self
    }

    /// Send a different secret than the one the remote expects
    pub fn with_client_key(mut self, key: Option<String>) -> Self {
        self.client_key = key;
        self
    }

    /// Delay every round trip
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed the remote with a snapshot
    pub fn with_snapshot(self, snapshot: &Snapshot) -> GatewayResult<Self> {
        self.set_snapshot(snapshot)?;
        Ok(self)
    }

    pub fn set_snapshot(&self, snapshot: &Snapshot) -> GatewayResult<()> {
        let body = encode_snapshot(snapshot).map_err(GatewayError::Request)?;
        self.state.lock().body = Some(body);
        Ok(())
    }

    /// Store an arbitrary body, returned as-is by the next pulls
    pub fn set_raw(&self, body: impl Into<String>) {
        self.state.lock().body = Some(body.into());
    }

    /// The body last saved to the remote
    pub fn raw(&self) -> Option<String> {
        self.state.lock().body.clone()
    }

    /// Decode the stored body
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.raw()
            .and_then(|body| decode_snapshot(body.as_bytes()).ok())
    }

    /// Fail the next push with `err`; queued failures are used in order
    pub fn fail_next_push(&self, err: GatewayError) {
        self.state.lock().push_failures.push_back(err);
    }

    /// Fail the next pull with `err`
    pub fn fail_next_pull(&self, err: GatewayError) {
        self.state.lock().pull_failures.push_back(err);
    }

    /// Push attempts, failed ones included
    pub fn push_count(&self) -> u64 {
        self.pushes.load(Ordering::SeqCst)
    }

    /// Pull attempts, failed ones included
    pub fn pull_count(&self) -> u64 {
        self.pulls.load(Ordering::SeqCst)
    }

    /// Parse the request the way the remote endpoint would
    fn receive(&self, request: &Request) -> GatewayResult<Request> {
        let pairs = request.to_pairs();
        let parsed = Request::from_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())))
            .map_err(|e| GatewayError::Protocol {
                status: 400,
                body: e.to_string(),
            })?;

        if let Some(expected) = &self.required_key {
            if parsed.key() != Some(expected.as_str()) {
                return Err(GatewayError::Protocol {
                    status: 403,
                    body: "forbidden".into(),
                });
            }
        }

        Ok(parsed)
    }

    async fn round_trip(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl RemoteGateway for MemoryGateway {
    async fn push(&self, snapshot: &Snapshot) -> GatewayResult<Ack> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        let request = Request::save(snapshot, self.client_key.as_deref()).map_err(GatewayError::Request)?;
        self.round_trip().await;

        if let Some(err) = self.state.lock().push_failures.pop_front() {
            return Err(err);
        }

        match self.receive(&request)? {
            Request::Save { data, .. } => {
                debug!(version = snapshot.version, bytes = data.len(), "Remote stored snapshot");
                self.state.lock().body = Some(data);
                Ok(Ack::new("ok"))
            }
            Request::Load { .. } => Err(GatewayError::Protocol {
                status: 400,
                body: "expected save".into(),
            }),
        }
    }

    async fn pull(&self) -> GatewayResult<Snapshot> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        let request = Request::load(self.client_key.as_deref());
        self.round_trip().await;

        if let Some(err) = self.state.lock().pull_failures.pop_front() {
            return Err(err);
        }
        self.receive(&request)?;

        // A remote that was never written serves an empty replica
        let body = self.state.lock().body.clone();
        match body {
            Some(body) => decode_snapshot(body.as_bytes()).map_err(GatewayError::Validation),
            None => Ok(Snapshot::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_core::Item;
    use shelf_protocol::ProtocolError;

    #[tokio::test]
    async fn test_push_then_pull() {
        let remote = MemoryGateway::new();
        assert_eq!(remote.pull().await.unwrap(), Snapshot::new());

        let mut snap = Snapshot::new();
        snap.version = 2;
        snap.items.push(Item::placeholder("A1"));
        remote.push(&snap).await.unwrap();

        assert_eq!(remote.pull().await.unwrap(), snap);
        assert_eq!(remote.snapshot(), Some(snap));
        assert_eq!(remote.push_count(), 1);
        assert_eq!(remote.pull_count(), 2);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let remote = MemoryGateway::new();
        remote.fail_next_push(GatewayError::transport("offline"));

        assert!(matches!(
            remote.push(&Snapshot::new()).await,
            Err(GatewayError::Transport(_))
        ));
        assert!(remote.raw().is_none());

        // Queue drained
        remote.push(&Snapshot::new()).await.unwrap();
        assert!(remote.raw().is_some());
    }

    #[tokio::test]
    async fn test_invalid_body_fails_validation() {
        let remote = MemoryGateway::new();
        remote.set_raw(r#"{"version": 4}"#);

        assert_eq!(
            remote.pull().await,
            Err(GatewayError::Validation(ProtocolError::MissingItems))
        );
    }

    #[tokio::test]
    async fn test_shared_key() {
        let remote = MemoryGateway::new().with_key("right");
        remote.push(&Snapshot::new()).await.unwrap();
        remote.pull().await.unwrap();

        let remote = MemoryGateway::new()
            .with_key("right")
            .with_client_key(Some("wrong".into()));
        assert!(matches!(
            remote.push(&Snapshot::new()).await,
            Err(GatewayError::Protocol { status: 403, .. })
        ));
        assert!(matches!(
            remote.pull().await,
            Err(GatewayError::Protocol { status: 403, .. })
        ));
        assert!(remote.raw().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency() {
        let remote = MemoryGateway::new().with_latency(Duration::from_millis(250));
        let start = tokio::time::Instant::now();
        remote.pull().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(250));
    }
}
