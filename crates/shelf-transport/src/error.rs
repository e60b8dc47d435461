//! Gateway error types

use shelf_protocol::ProtocolError;
use thiserror::Error;

/// Errors from a remote round trip
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// No response was received (connect failure, timeout, reset)
    #[error("Transport error: {0}")]
    Transport(String),

    /// A response was received but its status signals failure
    #[error("Remote returned status {status}: {body}")]
    Protocol { status: u16, body: String },

    /// The pulled payload failed structural validation
    #[error("Invalid remote payload: {0}")]
    Validation(ProtocolError),

    /// The request could not be built
    #[error("Request error: {0}")]
    Request(ProtocolError),
}

impl GatewayError {
    pub fn transport(msg: impl std::fmt::Display) -> Self {
        GatewayError::Transport(msg.to_string())
    }

    /// Whether a retry may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport(_) | GatewayError::Protocol { .. }
        )
    }

    /// Short label for logs and status reporting
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Transport(_) => "transport",
            GatewayError::Protocol { .. } => "protocol",
            GatewayError::Validation(_) => "validation",
            GatewayError::Request(_) => "request",
        }
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
