//! Aggregate records feeding the composite dashboard summary.
//!
//! Every field is optional: the summary derives each value through an
//! ordered fallback chain and a missing field simply defers to the next source.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Legacy trade statistics (`/api/trades/stats`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    #[serde(default)]
    pub total_profit: Option<Decimal>,
    #[serde(default)]
    pub today_profit: Option<Decimal>,
    /// Win rate as a fraction (0.0 - 1.0).
    #[serde(default)]
    pub win_rate: Option<f64>,
    #[serde(default)]
    pub total_trades: Option<u64>,
    #[serde(default)]
    pub open_positions: Option<u64>,
}

/// Dedicated P&L endpoint (`/api/pnl`). Preferred over [`TradeStats`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PnlSummary {
    #[serde(default)]
    pub total_pnl: Option<Decimal>,
    #[serde(default)]
    pub daily_pnl: Option<Decimal>,
    #[serde(default)]
    pub win_rate: Option<f64>,
    #[serde(default)]
    pub trade_count: Option<u64>,
    #[serde(default)]
    pub open_positions: Option<u64>,
}

/// Swarm agent and scanner health (`/api/swarm/health`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwarmHealth {
    /// Overall status string reported by the swarm ("healthy", "degraded", ...).
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub active_agents: Option<u32>,
    #[serde(default)]
    pub total_agents: Option<u32>,
    #[serde(default)]
    pub scanner_healthy: Option<bool>,
    #[serde(default)]
    pub last_scan_at: Option<DateTime<Utc>>,
}
