//! Server-owned records and their status enums.
//!
//! Status enums deserialize unknown server values into `Unknown` so a new
//! backend status never fails a whole collection. Fields the client does not
//! model are kept in `extra` and survive a serialize round-trip.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::{Entity, EntityKind, EntityOrigin};
use crate::error::{CoreError, Result};

/// ID prefix for locally synthesized records.
pub const SYNTHETIC_ID_PREFIX: &str = "synthetic:";

// ============================================================================
// Edge
// ============================================================================

/// Edge lifecycle: detected -> pending_approval -> executing -> executed/failed/rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStatus {
    #[default]
    Detected,
    PendingApproval,
    Approved,
    Executing,
    Executed,
    Failed,
    Rejected,
    #[serde(other)]
    Unknown,
}

impl EdgeStatus {
    /// In-flight statuses that must never be left standing after a failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::PendingApproval | Self::Executing)
    }

    /// Final statuses.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::Failed | Self::Rejected)
    }

    /// Awaiting a user decision.
    pub fn awaits_decision(&self) -> bool {
        matches!(self, Self::Detected | Self::PendingApproval)
    }
}

/// A detected trading opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    #[serde(default)]
    pub status: EdgeStatus,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub strategy_id: Option<String>,
    /// Expected profit in quote currency.
    #[serde(default)]
    pub expected_profit: Option<Decimal>,
    /// Detector confidence (0.0 - 1.0).
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub detected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Edge {
    pub fn new(id: impl Into<String>, status: EdgeStatus) -> Self {
        Self {
            id: id.into(),
            status,
            market: None,
            strategy_id: None,
            expected_profit: None,
            confidence: None,
            detected_at: None,
            rejection_reason: None,
            extra: Map::new(),
        }
    }
}

impl Entity for Edge {
    type Status = EdgeStatus;
    const KIND: EntityKind = EntityKind::Edge;

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> EdgeStatus {
        self.status
    }

    fn set_status(&mut self, status: EdgeStatus) {
        self.status = status;
    }

    fn failure_status() -> EdgeStatus {
        EdgeStatus::Failed
    }
}

/// Options for executing an edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteOptions {
    /// Override the trade amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    /// Maximum slippage in basis points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_slippage_bps: Option<u32>,
    /// Simulate without submitting.
    #[serde(default)]
    pub dry_run: bool,
}

// ============================================================================
// Trade
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    #[default]
    Pending,
    Open,
    Closed,
    Failed,
    #[serde(other)]
    Unknown,
}

/// An executed (or executing) trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    #[serde(default)]
    pub status: TradeStatus,
    /// Edge this trade was executed from.
    #[serde(default)]
    pub edge_id: Option<String>,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub entry_price: Option<Decimal>,
    #[serde(default)]
    pub pnl: Option<Decimal>,
    #[serde(default)]
    pub opened_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub origin: EntityOrigin,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Trade {
    pub fn new(id: impl Into<String>, status: TradeStatus) -> Self {
        Self {
            id: id.into(),
            status,
            edge_id: None,
            market: None,
            side: None,
            amount: None,
            entry_price: None,
            pnl: None,
            opened_at: None,
            origin: EntityOrigin::Authoritative,
            extra: Map::new(),
        }
    }

    /// ID a synthetic trade for `edge_id` is stored under.
    pub fn synthetic_id(edge_id: &str) -> String {
        format!("{SYNTHETIC_ID_PREFIX}{edge_id}")
    }

    /// Build a placeholder trade from an "edge executed" push event.
    ///
    /// The placeholder is keyed by the originating edge so the next
    /// authoritative trade list (or upsert) for that edge replaces it.
    pub fn synthetic(
        edge_id: &str,
        amount: Option<Decimal>,
        market: Option<String>,
        observed_at: DateTime<Utc>,
    ) -> Result<Self> {
        if edge_id.trim().is_empty() {
            return Err(CoreError::InvalidEntity(
                "synthetic trade requires an edge id".to_string(),
            ));
        }

        Ok(Self {
            id: Self::synthetic_id(edge_id),
            status: TradeStatus::Pending,
            edge_id: Some(edge_id.to_string()),
            market,
            side: None,
            amount,
            entry_price: None,
            pnl: None,
            opened_at: Some(observed_at),
            origin: EntityOrigin::Synthetic,
            extra: Map::new(),
        })
    }
}

impl Entity for Trade {
    type Status = TradeStatus;
    const KIND: EntityKind = EntityKind::Trade;

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> TradeStatus {
        self.status
    }

    fn set_status(&mut self, status: TradeStatus) {
        self.status = status;
    }

    fn failure_status() -> TradeStatus {
        TradeStatus::Failed
    }

    fn correlation_key(&self) -> Option<&str> {
        self.edge_id.as_deref()
    }

    fn is_synthetic(&self) -> bool {
        self.origin == EntityOrigin::Synthetic
    }
}

// ============================================================================
// Strategy
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyStatus {
    Active,
    #[default]
    Paused,
    /// Local transient while an activate/pause request is in flight.
    Updating,
    Stopped,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: String,
    #[serde(default)]
    pub status: StrategyStatus,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub allocation: Option<Decimal>,
    #[serde(default)]
    pub pnl: Option<Decimal>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Strategy {
    pub fn new(id: impl Into<String>, status: StrategyStatus) -> Self {
        Self {
            id: id.into(),
            status,
            name: None,
            allocation: None,
            pnl: None,
            extra: Map::new(),
        }
    }
}

impl Entity for Strategy {
    type Status = StrategyStatus;
    const KIND: EntityKind = EntityKind::Strategy;

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> StrategyStatus {
        self.status
    }

    fn set_status(&mut self, status: StrategyStatus) {
        self.status = status;
    }

    fn failure_status() -> StrategyStatus {
        StrategyStatus::Failed
    }
}

// ============================================================================
// Position
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    #[default]
    Open,
    Closing,
    Closed,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    #[serde(default)]
    pub status: PositionStatus,
    #[serde(default)]
    pub market: Option<String>,
    /// "long" or "short".
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub size: Option<Decimal>,
    #[serde(default)]
    pub entry_price: Option<Decimal>,
    #[serde(default)]
    pub mark_price: Option<Decimal>,
    #[serde(default)]
    pub unrealized_pnl: Option<Decimal>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Position {
    pub fn new(id: impl Into<String>, status: PositionStatus) -> Self {
        Self {
            id: id.into(),
            status,
            market: None,
            side: None,
            size: None,
            entry_price: None,
            mark_price: None,
            unrealized_pnl: None,
            extra: Map::new(),
        }
    }
}

impl Entity for Position {
    type Status = PositionStatus;
    const KIND: EntityKind = EntityKind::Position;

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> PositionStatus {
        self.status
    }

    fn set_status(&mut self, status: PositionStatus) {
        self.status = status;
    }

    fn failure_status() -> PositionStatus {
        PositionStatus::Failed
    }
}

// ============================================================================
// ThreatAlert
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    #[default]
    New,
    Acknowledged,
    Resolved,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Threat signal raised by the backend scanners (rug pulls, honeypots, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatAlert {
    pub id: String,
    #[serde(default)]
    pub status: AlertStatus,
    #[serde(default)]
    pub severity: AlertSeverity,
    #[serde(default)]
    pub message: Option<String>,
    /// Token or wallet the alert concerns.
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub raised_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ThreatAlert {
    pub fn new(id: impl Into<String>, severity: AlertSeverity) -> Self {
        Self {
            id: id.into(),
            status: AlertStatus::New,
            severity,
            message: None,
            subject: None,
            raised_at: None,
            extra: Map::new(),
        }
    }

    pub fn is_unresolved(&self) -> bool {
        !matches!(self.status, AlertStatus::Resolved)
    }
}

impl Entity for ThreatAlert {
    type Status = AlertStatus;
    const KIND: EntityKind = EntityKind::ThreatAlert;

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> AlertStatus {
        self.status
    }

    fn set_status(&mut self, status: AlertStatus) {
        self.status = status;
    }

    fn failure_status() -> AlertStatus {
        AlertStatus::Failed
    }
}

// ============================================================================
// Kol
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KolStatus {
    #[default]
    Tracked,
    Muted,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Tracked key opinion leader wallet/account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kol {
    pub id: String,
    #[serde(default)]
    pub status: KolStatus,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for Kol {
    type Status = KolStatus;
    const KIND: EntityKind = EntityKind::Kol;

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> KolStatus {
        self.status
    }

    fn set_status(&mut self, status: KolStatus) {
        self.status = status;
    }

    fn failure_status() -> KolStatus {
        KolStatus::Failed
    }
}

// ============================================================================
// CurveToken
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveStatus {
    #[default]
    Bonding,
    Graduated,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Token trading on a bonding curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveToken {
    pub id: String,
    #[serde(default)]
    pub status: CurveStatus,
    #[serde(default)]
    pub symbol: Option<String>,
    /// Bonding progress (0.0 - 1.0).
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<Decimal>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for CurveToken {
    type Status = CurveStatus;
    const KIND: EntityKind = EntityKind::CurveToken;

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> CurveStatus {
        self.status
    }

    fn set_status(&mut self, status: CurveStatus) {
        self.status = status;
    }

    fn failure_status() -> CurveStatus {
        CurveStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_edge_unknown_status_decodes() {
        let edge: Edge =
            serde_json::from_str(r#"{"id":"E1","status":"quantum_entangled"}"#).unwrap();
        assert_eq!(edge.status, EdgeStatus::Unknown);
    }

    #[test]
    fn test_edge_missing_status_defaults_to_detected() {
        let edge: Edge = serde_json::from_str(r#"{"id":"E1"}"#).unwrap();
        assert_eq!(edge.status, EdgeStatus::Detected);
        assert!(edge.status.awaits_decision());
    }

    #[test]
    fn test_edge_keeps_unmodelled_fields() {
        let raw = r#"{"id":"E1","status":"pending_approval","venue":"raydium","hops":3}"#;
        let edge: Edge = serde_json::from_str(raw).unwrap();
        assert_eq!(edge.status, EdgeStatus::PendingApproval);
        assert_eq!(edge.extra.get("venue"), Some(&Value::from("raydium")));

        let back = serde_json::to_value(&edge).unwrap();
        assert_eq!(back["hops"], Value::from(3));
    }

    #[test]
    fn test_edge_status_classification() {
        assert!(EdgeStatus::Executing.is_transient());
        assert!(EdgeStatus::PendingApproval.is_transient());
        assert!(!EdgeStatus::Failed.is_transient());
        assert!(EdgeStatus::Failed.is_terminal());
        assert!(EdgeStatus::Rejected.is_terminal());
        assert!(!EdgeStatus::Approved.is_terminal());
    }

    #[test]
    fn test_trade_decodes_numeric_amount() {
        let trade: Trade =
            serde_json::from_str(r#"{"id":"T9","edge_id":"E1","amount":1.5,"status":"open"}"#)
                .unwrap();
        assert_eq!(trade.amount, Some(dec!(1.5)));
        assert_eq!(trade.correlation_key(), Some("E1"));
        assert!(!trade.is_synthetic());
    }

    #[test]
    fn test_synthetic_trade_is_keyed_by_edge() {
        let trade = Trade::synthetic("E1", Some(dec!(1.5)), None, Utc::now()).unwrap();
        assert_eq!(trade.id, "synthetic:E1");
        assert_eq!(trade.correlation_key(), Some("E1"));
        assert_eq!(trade.status, TradeStatus::Pending);
        assert!(trade.is_synthetic());
        assert_ne!(trade.id(), "E1");
    }

    #[test]
    fn test_synthetic_trade_requires_edge_id() {
        let result = Trade::synthetic("  ", None, None, Utc::now());
        assert!(matches!(result, Err(CoreError::InvalidEntity(_))));
    }

    #[test]
    fn test_synthetic_origin_not_serialized() {
        let trade = Trade::synthetic("E1", None, None, Utc::now()).unwrap();
        let json = serde_json::to_value(&trade).unwrap();
        assert!(json.get("origin").is_none());

        let decoded: Trade = serde_json::from_value(json).unwrap();
        assert!(!decoded.is_synthetic());
    }

    #[test]
    fn test_failure_statuses() {
        assert_eq!(Edge::failure_status(), EdgeStatus::Failed);
        assert_eq!(Strategy::failure_status(), StrategyStatus::Failed);
        assert_eq!(ThreatAlert::failure_status(), AlertStatus::Failed);
    }

    #[test]
    fn test_execute_options_skip_empty_fields() {
        let json = serde_json::to_string(&ExecuteOptions::default()).unwrap();
        assert_eq!(json, r#"{"dry_run":false}"#);
    }

    #[test]
    fn test_alert_unresolved() {
        let mut alert = ThreatAlert::new("A1", AlertSeverity::High);
        assert!(alert.is_unresolved());
        alert.set_status(AlertStatus::Resolved);
        assert!(!alert.is_unresolved());
    }
}
