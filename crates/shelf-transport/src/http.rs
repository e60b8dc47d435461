//! HTTP gateway
//!
//! Save is a form POST (`action=save`, `data`, optional `key`) whose body is
//! an opaque acknowledgement; load is a GET with `?action=load[&key=…]`
//! returning the remote snapshot JSON.

use crate::{GatewayError, GatewayResult, RemoteGateway};
use async_trait::async_trait;
use reqwest::Client;
use shelf_core::Snapshot;
use shelf_protocol::{decode_snapshot, response::excerpt, Ack, Request};
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Gateway to a remote save/load endpoint over HTTP
pub struct HttpGateway {
    client: Client,
    endpoint: String,
    key: Option<String>,
}

impl HttpGateway {
    pub fn new(endpoint: impl Into<String>, key: Option<String>) -> GatewayResult<Self> {
        Self::with_timeout(endpoint, key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        key: Option<String>,
        timeout: Duration,
    ) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::transport)?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            key: key.filter(|k| !k.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Read the body and map a non-success status to a protocol error
    async fn read_body(&self, response: reqwest::Response) -> GatewayResult<Vec<u8>> {
        let status = response.status();
        let body = response.bytes().await.map_err(GatewayError::transport)?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            warn!(status = status.as_u16(), endpoint = %self.endpoint, "Remote rejected request");
            return Err(GatewayError::Protocol {
                status: status.as_u16(),
                body: excerpt(&text, Ack::EXCERPT_LEN),
            });
        }

        Ok(body.to_vec())
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn push(&self, snapshot: &Snapshot) -> GatewayResult<Ack> {
        let request =
            Request::save(snapshot, self.key.as_deref()).map_err(GatewayError::Request)?;

        let response = self
            .client
            .post(&self.endpoint)
            .form(&request.to_pairs())
            .send()
            .await
            .map_err(GatewayError::transport)?;

        let body = self.read_body(response).await?;
        let ack = Ack::new(String::from_utf8_lossy(&body));
        debug!(version = snapshot.version, ack = %ack.excerpt(), "Snapshot saved");
        Ok(ack)
    }

    async fn pull(&self) -> GatewayResult<Snapshot> {
        let request = Request::load(self.key.as_deref());

        let response = self
            .client
            .get(&self.endpoint)
            .query(&request.to_pairs())
            .send()
            .await
            .map_err(GatewayError::transport)?;

        let body = self.read_body(response).await?;
        let snapshot = decode_snapshot(&body).map_err(GatewayError::Validation)?;
        debug!(version = snapshot.version, items = snapshot.items.len(), "Snapshot loaded");
        Ok(snapshot)
    }
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("endpoint", &self.endpoint)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
