//! Dashboard error types.

use edgescope_core::EntityKind;
use thiserror::Error;

/// Dashboard result type.
pub type DashboardResult<T> = Result<T, DashboardError>;

#[derive(Debug, Error)]
pub enum DashboardError {
    /// Primary collection fetch failed; the previous collection is kept.
    #[error("failed to load {kind}: {reason}")]
    LoadFailed { kind: EntityKind, reason: String },
}
