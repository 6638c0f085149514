//! Error types for edgescope-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown entity kind: {0}")]
    UnknownKind(String),

    #[error("Invalid entity: {0}")]
    InvalidEntity(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
