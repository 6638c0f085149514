//! Core domain types for the edgescope dashboard client.
//!
//! This crate provides the server-owned records mirrored on the client:
//! - `EntityKind`: the collections the store keeps (edges, trades, ...)
//! - `Entity`: identity, status and correlation contract shared by every record
//! - `Edge`, `Trade`, `Strategy`, `Position`, `ThreatAlert`, `Kol`, `CurveToken`
//! - `ApiEnvelope`: the `{success, data, error}` response envelope
//! - `TradeStats`, `PnlSummary`, `SwarmHealth`: aggregate summary sources

pub mod entity;
pub mod envelope;
pub mod error;
pub mod stats;
pub mod types;

pub use entity::{Entity, EntityKind, EntityOrigin};
pub use envelope::ApiEnvelope;
pub use error::{CoreError, Result};
pub use stats::{PnlSummary, SwarmHealth, TradeStats};
pub use types::{
    AlertSeverity, AlertStatus, CurveStatus, CurveToken, Edge, EdgeStatus, ExecuteOptions, Kol,
    KolStatus, Position, PositionStatus, Strategy, StrategyStatus, ThreatAlert, Trade,
    TradeStatus, SYNTHETIC_ID_PREFIX,
};
