//! Store error types.

use edgescope_core::EntityKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Entity not found: {kind}/{id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Invalid entity: {0}")]
    InvalidEntity(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
