//! Dashboard view.
//!
//! Pure read-side composition of a store snapshot, the last composite
//! summary and the connection status. Holds no state of its own.

use std::collections::BTreeMap;

use edgescope_core::{
    CurveToken, Edge, Entity, EntityKind, Kol, Position, PositionStatus, Strategy,
    StrategyStatus, ThreatAlert, Trade,
};
use edgescope_store::StoreSnapshot;
use edgescope_stream::ConnectionState;
use serde::Serialize;

use crate::summary::CompositeSummary;

/// Derived counters shown alongside the collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ViewCounts {
    /// Edges awaiting a user decision.
    pub pending_edges: usize,
    pub active_strategies: usize,
    pub open_positions: usize,
    pub unresolved_alerts: usize,
    /// Trades still represented by a local placeholder.
    pub synthetic_trades: usize,
}

/// Everything the rendering layer reads.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    /// Store revision this view was composed from.
    pub revision: u64,
    pub connection: ConnectionState,
    pub connected: bool,
    pub edges: Vec<Edge>,
    pub trades: Vec<Trade>,
    pub strategies: Vec<Strategy>,
    pub positions: Vec<Position>,
    pub threat_alerts: Vec<ThreatAlert>,
    pub kols: Vec<Kol>,
    pub curve_tokens: Vec<CurveToken>,
    pub counts: ViewCounts,
    pub summary: Option<CompositeSummary>,
    /// Primary collection loads that failed, by kind.
    pub load_errors: BTreeMap<EntityKind, String>,
}

impl DashboardView {
    pub fn compose(
        snapshot: &StoreSnapshot,
        summary: Option<&CompositeSummary>,
        connection: ConnectionState,
        load_errors: &BTreeMap<EntityKind, String>,
    ) -> Self {
        let counts = ViewCounts {
            pending_edges: snapshot
                .edges
                .iter()
                .filter(|e| e.status.awaits_decision())
                .count(),
            active_strategies: snapshot
                .strategies
                .iter()
                .filter(|s| s.status == StrategyStatus::Active)
                .count(),
            open_positions: snapshot
                .positions
                .iter()
                .filter(|p| matches!(p.status, PositionStatus::Open | PositionStatus::Closing))
                .count(),
            unresolved_alerts: snapshot
                .threat_alerts
                .iter()
                .filter(|a| a.is_unresolved())
                .count(),
            synthetic_trades: snapshot.trades.iter().filter(|t| t.is_synthetic()).count(),
        };

        Self {
            revision: snapshot.revision,
            connection,
            connected: connection.is_connected(),
            edges: snapshot.edges.clone(),
            trades: snapshot.trades.clone(),
            strategies: snapshot.strategies.clone(),
            positions: snapshot.positions.clone(),
            threat_alerts: snapshot.threat_alerts.clone(),
            kols: snapshot.kols.clone(),
            curve_tokens: snapshot.curve_tokens.clone(),
            counts,
            summary: summary.cloned(),
            load_errors: load_errors.clone(),
        }
    }

    /// A primary collection failed to load.
    pub fn has_load_error(&self) -> bool {
        !self.load_errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use edgescope_core::{AlertSeverity, AlertStatus, EdgeStatus, TradeStatus};

    fn snapshot() -> StoreSnapshot {
        let mut resolved = ThreatAlert::new("A2", AlertSeverity::Low);
        resolved.status = AlertStatus::Resolved;

        StoreSnapshot {
            revision: 7,
            edges: vec![
                Edge::new("E1", EdgeStatus::PendingApproval),
                Edge::new("E2", EdgeStatus::Executed),
                Edge::new("E3", EdgeStatus::Detected),
            ],
            trades: vec![
                Trade::synthetic("E2", None, None, Utc::now()).unwrap(),
                Trade::new("T1", TradeStatus::default()),
            ],
            strategies: vec![
                Strategy::new("S1", StrategyStatus::Active),
                Strategy::new("S2", StrategyStatus::Paused),
            ],
            positions: vec![Position::new("P1", PositionStatus::Open)],
            threat_alerts: vec![ThreatAlert::new("A1", AlertSeverity::High), resolved],
            ..Default::default()
        }
    }

    #[test]
    fn test_compose_counts() {
        let view = DashboardView::compose(
            &snapshot(),
            None,
            ConnectionState::Connected,
            &BTreeMap::new(),
        );

        assert_eq!(view.revision, 7);
        assert!(view.connected);
        assert_eq!(
            view.counts,
            ViewCounts {
                pending_edges: 2,
                active_strategies: 1,
                open_positions: 1,
                unresolved_alerts: 1,
                synthetic_trades: 1,
            }
        );
        assert!(!view.has_load_error());
    }

    #[test]
    fn test_compose_leaves_inputs_untouched() {
        let snapshot = snapshot();
        let before = snapshot.clone();
        let mut errors = BTreeMap::new();
        errors.insert(EntityKind::Edge, "boom".to_string());

        let view = DashboardView::compose(
            &snapshot,
            None,
            ConnectionState::Reconnecting,
            &errors,
        );

        assert_eq!(snapshot.edges, before.edges);
        assert_eq!(snapshot.trades, before.trades);
        assert!(!view.connected);
        assert!(view.has_load_error());
        assert_eq!(view.load_errors.get(&EntityKind::Edge).unwrap(), "boom");
    }
}
