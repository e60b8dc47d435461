//! Sync configuration

use crate::retry::RetryPolicy;
use shelf_core::TieBreak;
use shelf_transport::{GatewayResult, HttpGateway, OfflineGateway, RemoteGateway};
use std::sync::Arc;
use std::time::Duration;

/// Quiet period after the last local edit before a push fires
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(600);

/// Period of the background pull, when enabled
pub const DEFAULT_PULL_INTERVAL: Duration = Duration::from_secs(30);

/// Per-request timeout of the HTTP gateway
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Configuration for a replica and its scheduler
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Remote save/load endpoint; `None` keeps the replica offline
    pub endpoint: Option<String>,
    /// Shared secret sent with every request
    pub key: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Debounce window for pushes
    pub debounce: Duration,
    /// Whether local edits schedule a push
    pub auto_push: bool,
    /// Retry policy for pushes (pulls are never retried)
    pub retry: RetryPolicy,
    /// Background pull period; `None` disables it
    pub pull_interval: Option<Duration>,
    /// Which side wins merge ties
    pub tie_break: TieBreak,
}

impl SyncConfig {
    pub fn new() -> Self {
        Self {
            endpoint: None,
            key: None,
            timeout: DEFAULT_TIMEOUT,
            debounce: DEFAULT_DEBOUNCE,
            auto_push: true,
            retry: RetryPolicy::default(),
            pull_interval: None,
            tie_break: TieBreak::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.key = if key.is_empty() { None } else { Some(key) };
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_auto_push(mut self, enabled: bool) -> Self {
        self.auto_push = enabled;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_pull_interval(mut self, interval: Duration) -> Self {
        self.pull_interval = Some(interval);
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Whether a remote endpoint is configured
    pub fn is_online(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Build the gateway this configuration points at
    pub fn gateway(&self) -> GatewayResult<Arc<dyn RemoteGateway>> {
        match &self.endpoint {
            Some(endpoint) => Ok(Arc::new(HttpGateway::with_timeout(
                endpoint.clone(),
                self.key.clone(),
                self.timeout,
            )?)),
            None => Ok(Arc::new(OfflineGateway)),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
