//! Error types for Shelf Core

use thiserror::Error;

/// Core error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("No item matches barcode: {0}")]
    UnknownBarcode(String),

    #[error("Invalid SKU: {0}")]
    InvalidSku(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(f64),

    #[error("Snapshot version {0} cannot be advanced")]
    VersionExhausted(u64),

    #[error("Unknown transaction kind: {0}")]
    InvalidKind(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias for Shelf Core operations
pub type Result<T> = std::result::Result<T, Error>;
