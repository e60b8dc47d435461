//! Protocol error types

use thiserror::Error;

/// Protocol-specific errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Payload is not a JSON object")]
    NotAnObject,

    #[error("Payload has no item collection")]
    MissingItems,

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Payload too large: {size} > {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Encode error: {0}")]
    Encode(String),
}

impl ProtocolError {
    pub(crate) fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ProtocolError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
