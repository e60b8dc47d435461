//! Sync status reporting

use shelf_storage::StorageError;
use shelf_transport::GatewayError;

/// Sync operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Push,
    Pull,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Push => "push",
            Operation::Pull => "pull",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure classes reported in the status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No response from the remote
    Transport,
    /// The remote answered with a failure status
    Protocol,
    /// The pulled payload was malformed
    Validation,
    /// The local store failed
    Storage,
    /// The request could not be built
    Request,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transport => "transport",
            FailureKind::Protocol => "protocol",
            FailureKind::Validation => "validation",
            FailureKind::Storage => "storage",
            FailureKind::Request => "request",
        }
    }
}

/// A recorded failure
#[derive(Debug, Clone, PartialEq)]
pub struct SyncFailure {
    pub op: Operation,
    pub kind: FailureKind,
    pub message: String,
    /// Wall-clock ms
    pub at: u64,
}

impl SyncFailure {
    pub(crate) fn from_gateway(op: Operation, err: &GatewayError, at: u64) -> Self {
        let kind = match err {
            GatewayError::Transport(_) => FailureKind::Transport,
            GatewayError::Protocol { .. } => FailureKind::Protocol,
            GatewayError::Validation(_) => FailureKind::Validation,
            GatewayError::Request(_) => FailureKind::Request,
        };
        Self {
            op,
            kind,
            message: err.to_string(),
            at,
        }
    }

    pub(crate) fn from_storage(op: Operation, err: &StorageError, at: u64) -> Self {
        Self {
            op,
            kind: FailureKind::Storage,
            message: err.to_string(),
            at,
        }
    }
}

impl std::fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed ({}): {}", self.op, self.kind.as_str(), self.message)
    }
}

/// Result of one push or pull request
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Done; carries the snapshot version that was pushed or applied
    Completed { version: u64 },
    /// Another sync operation was in flight; nothing was done
    Skipped,
    Failed(SyncFailure),
}

impl SyncOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SyncOutcome::Completed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            SyncOutcome::Completed { .. } => "completed",
            SyncOutcome::Skipped => "skipped",
            SyncOutcome::Failed(_) => "failed",
        }
    }
}

/// Push track state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushState {
    #[default]
    Idle,
    Debouncing,
    Pushing,
}

/// Snapshot of the scheduler's state, published on every change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStatus {
    pub push: PushState,
    /// A push or pull is in flight
    pub syncing: bool,
    /// Wall-clock ms of the last successful push
    pub last_push: Option<u64>,
    /// Wall-clock ms of the last successful pull
    pub last_pull: Option<u64>,
    /// Last failure, cleared by the next success of the same operation
    pub last_error: Option<SyncFailure>,
}

impl SyncStatus {
    pub fn is_failed(&self) -> bool {
        self.last_error.is_some()
    }
}

/// Running counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub pushes: u64,
    pub push_failures: u64,
    pub pulls: u64,
    pub pull_failures: u64,
    pub retries: u64,
    /// Requests dropped because another sync was in flight
    pub skipped: u64,
    /// Debounce timers superseded by a later edit
    pub coalesced: u64,
}

/// Both halves of a manual sync
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub push: SyncOutcome,
    pub pull: SyncOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_protocol::ProtocolError;

    #[test]
    fn test_failure_kinds() {
        let f = SyncFailure::from_gateway(
            Operation::Pull,
            &GatewayError::Validation(ProtocolError::MissingItems),
            5,
        );
        assert_eq!(f.kind, FailureKind::Validation);
        assert_eq!(f.to_string(), "pull failed (validation): Invalid remote payload: Payload has no item collection");

        let f = SyncFailure::from_storage(
            Operation::Pull,
            &StorageError::Database("locked".into()),
            5,
        );
        assert_eq!(f.kind, FailureKind::Storage);
    }
}
