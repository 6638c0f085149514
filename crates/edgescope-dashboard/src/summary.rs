//! Composite summary and per-field fallback chains.
//!
//! The summary is assembled from six independently fetched branches. Each
//! field is resolved by a [`FieldChain`]: an ordered list of
//! `(source, extractor)` pairs tried in priority order, then a hard default.
//!
//! | Field             | Chain                                                  |
//! |-------------------|--------------------------------------------------------|
//! | `total_profit`    | pnl.total_pnl → trade_stats.total_profit → 0           |
//! | `today_profit`    | pnl.daily_pnl → trade_stats.today_profit → 0           |
//! | `win_rate`        | pnl.win_rate → trade_stats.win_rate → 0.0              |
//! | `total_trades`    | pnl.trade_count → trade_stats.total_trades → 0         |
//! | `open_positions`  | pnl.open_positions → trade_stats.open_positions → 0    |
//! | `active_agents`   | swarm.active_agents → 0                                |
//! | `swarm_status`    | swarm.status → "unknown"                               |
//! | `scanner_healthy` | swarm.scanner_healthy → false                          |
//! | `recent_*`        | matching recent branch → empty                         |

use std::collections::BTreeMap;
use std::fmt;

use edgescope_client::ClientResult;
use edgescope_core::{ApiEnvelope, Edge, PnlSummary, SwarmHealth, ThreatAlert, Trade, TradeStats};
use rust_decimal::Decimal;
use serde::Serialize;

/// Where a summary field came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    Pnl,
    TradeStats,
    Swarm,
    RecentEdges,
    RecentTrades,
    RecentAlerts,
    /// No branch supplied the field; the hard default was used.
    Default,
}

impl SummarySource {
    /// The six fetched branches, in fan-out order.
    pub const BRANCHES: [SummarySource; 6] = [
        SummarySource::TradeStats,
        SummarySource::Swarm,
        SummarySource::RecentEdges,
        SummarySource::RecentTrades,
        SummarySource::RecentAlerts,
        SummarySource::Pnl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pnl => "pnl",
            Self::TradeStats => "trade_stats",
            Self::Swarm => "swarm",
            Self::RecentEdges => "recent_edges",
            Self::RecentTrades => "recent_trades",
            Self::RecentAlerts => "recent_alerts",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for SummarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settled outcome of one aggregator branch.
#[derive(Debug, Clone, PartialEq)]
pub enum BranchResult<T> {
    /// Success with data.
    Loaded(T),
    /// Success without (usable) data.
    Empty,
    /// Transport error or `success:false`.
    Failed(String),
}

impl<T> BranchResult<T> {
    /// Isolate one endpoint call: nothing it returns can fail the aggregate.
    pub fn from_call(result: ClientResult<ApiEnvelope<T>>) -> Self {
        match result {
            Ok(envelope) if envelope.success => match envelope.data {
                Some(data) => Self::Loaded(data),
                None => Self::Empty,
            },
            Ok(envelope) => Self::Failed(envelope.error_message()),
            Err(e) => Self::Failed(e.to_string()),
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Loaded(data) => Some(data),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// All six branches after fan-in.
#[derive(Debug, Clone)]
pub struct SummaryBranches {
    pub trade_stats: BranchResult<TradeStats>,
    pub swarm: BranchResult<SwarmHealth>,
    pub recent_edges: BranchResult<Vec<Edge>>,
    pub recent_trades: BranchResult<Vec<Trade>>,
    pub recent_alerts: BranchResult<Vec<ThreatAlert>>,
    pub pnl: BranchResult<PnlSummary>,
}

impl SummaryBranches {
    /// Every branch failed with the same reason.
    pub fn all_failed(reason: &str) -> Self {
        Self {
            trade_stats: BranchResult::Failed(reason.to_string()),
            swarm: BranchResult::Failed(reason.to_string()),
            recent_edges: BranchResult::Failed(reason.to_string()),
            recent_trades: BranchResult::Failed(reason.to_string()),
            recent_alerts: BranchResult::Failed(reason.to_string()),
            pnl: BranchResult::Failed(reason.to_string()),
        }
    }

    /// Failure reason of one branch, if it failed.
    pub fn failure(&self, source: SummarySource) -> Option<&str> {
        match source {
            SummarySource::TradeStats => self.trade_stats.failure(),
            SummarySource::Swarm => self.swarm.failure(),
            SummarySource::RecentEdges => self.recent_edges.failure(),
            SummarySource::RecentTrades => self.recent_trades.failure(),
            SummarySource::RecentAlerts => self.recent_alerts.failure(),
            SummarySource::Pnl => self.pnl.failure(),
            SummarySource::Default => None,
        }
    }

    /// Failed branches in fan-out order.
    pub fn failures(&self) -> Vec<FailedBranch> {
        SummarySource::BRANCHES
            .iter()
            .filter_map(|source| {
                self.failure(*source).map(|reason| FailedBranch {
                    source: *source,
                    reason: reason.to_string(),
                })
            })
            .collect()
    }
}

/// A branch that failed during the last aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedBranch {
    pub source: SummarySource,
    pub reason: String,
}

type Extractor<T> = fn(&SummaryBranches) -> Option<T>;

/// Ordered source-priority chain for one summary field.
pub struct FieldChain<T> {
    field: &'static str,
    links: Vec<(SummarySource, Extractor<T>)>,
    default: T,
}

impl<T: Clone> FieldChain<T> {
    pub fn new(field: &'static str, default: T) -> Self {
        Self {
            field,
            links: Vec::new(),
            default,
        }
    }

    /// Append a lower-priority source.
    pub fn then(mut self, source: SummarySource, extractor: Extractor<T>) -> Self {
        self.links.push((source, extractor));
        self
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Sources in priority order, ending with [`SummarySource::Default`].
    pub fn sources(&self) -> Vec<SummarySource> {
        self.links
            .iter()
            .map(|(source, _)| *source)
            .chain(std::iter::once(SummarySource::Default))
            .collect()
    }

    /// First present value, with the source that supplied it.
    pub fn resolve(&self, branches: &SummaryBranches) -> (T, SummarySource) {
        self.links
            .iter()
            .find_map(|(source, extract)| extract(branches).map(|value| (value, *source)))
            .unwrap_or_else(|| (self.default.clone(), SummarySource::Default))
    }
}

pub fn total_profit_chain() -> FieldChain<Decimal> {
    FieldChain::new("total_profit", Decimal::ZERO)
        .then(SummarySource::Pnl, |b| b.pnl.data().and_then(|p| p.total_pnl))
        .then(SummarySource::TradeStats, |b| {
            b.trade_stats.data().and_then(|s| s.total_profit)
        })
}

pub fn today_profit_chain() -> FieldChain<Decimal> {
    FieldChain::new("today_profit", Decimal::ZERO)
        .then(SummarySource::Pnl, |b| b.pnl.data().and_then(|p| p.daily_pnl))
        .then(SummarySource::TradeStats, |b| {
            b.trade_stats.data().and_then(|s| s.today_profit)
        })
}

pub fn win_rate_chain() -> FieldChain<f64> {
    FieldChain::new("win_rate", 0.0)
        .then(SummarySource::Pnl, |b| b.pnl.data().and_then(|p| p.win_rate))
        .then(SummarySource::TradeStats, |b| {
            b.trade_stats.data().and_then(|s| s.win_rate)
        })
}

pub fn total_trades_chain() -> FieldChain<u64> {
    FieldChain::new("total_trades", 0)
        .then(SummarySource::Pnl, |b| b.pnl.data().and_then(|p| p.trade_count))
        .then(SummarySource::TradeStats, |b| {
            b.trade_stats.data().and_then(|s| s.total_trades)
        })
}

pub fn open_positions_chain() -> FieldChain<u64> {
    FieldChain::new("open_positions", 0)
        .then(SummarySource::Pnl, |b| {
            b.pnl.data().and_then(|p| p.open_positions)
        })
        .then(SummarySource::TradeStats, |b| {
            b.trade_stats.data().and_then(|s| s.open_positions)
        })
}

pub fn active_agents_chain() -> FieldChain<u32> {
    FieldChain::new("active_agents", 0).then(SummarySource::Swarm, |b| {
        b.swarm.data().and_then(|s| s.active_agents)
    })
}

pub fn swarm_status_chain() -> FieldChain<String> {
    FieldChain::new("swarm_status", "unknown".to_string()).then(SummarySource::Swarm, |b| {
        b.swarm.data().and_then(|s| s.status.clone())
    })
}

pub fn scanner_healthy_chain() -> FieldChain<bool> {
    FieldChain::new("scanner_healthy", false).then(SummarySource::Swarm, |b| {
        b.swarm.data().and_then(|s| s.scanner_healthy)
    })
}

pub fn recent_edges_chain() -> FieldChain<Vec<Edge>> {
    FieldChain::new("recent_edges", Vec::new())
        .then(SummarySource::RecentEdges, |b| b.recent_edges.data().cloned())
}

pub fn recent_trades_chain() -> FieldChain<Vec<Trade>> {
    FieldChain::new("recent_trades", Vec::new())
        .then(SummarySource::RecentTrades, |b| b.recent_trades.data().cloned())
}

pub fn recent_alerts_chain() -> FieldChain<Vec<ThreatAlert>> {
    FieldChain::new("recent_alerts", Vec::new())
        .then(SummarySource::RecentAlerts, |b| b.recent_alerts.data().cloned())
}

/// Best-effort read model built from the six branches.
///
/// Always materializes: a failed branch only defaults the fields it feeds.
#[derive(Debug, Clone, Serialize)]
pub struct CompositeSummary {
    /// When the summary was built (Unix milliseconds).
    pub built_at_ms: i64,
    pub total_profit: Decimal,
    pub today_profit: Decimal,
    /// Win rate (0.0 - 1.0).
    pub win_rate: f64,
    pub total_trades: u64,
    pub open_positions: u64,
    pub active_agents: u32,
    pub swarm_status: String,
    pub scanner_healthy: bool,
    /// Newest first, as returned by the server.
    pub recent_edges: Vec<Edge>,
    pub recent_trades: Vec<Trade>,
    pub recent_alerts: Vec<ThreatAlert>,
    /// Field name -> source that supplied it.
    pub sources: BTreeMap<&'static str, SummarySource>,
    pub failed_branches: Vec<FailedBranch>,
}

impl CompositeSummary {
    pub fn from_branches(branches: &SummaryBranches, built_at_ms: i64) -> Self {
        let mut sources = BTreeMap::new();
        let mut take = |field: &'static str, source: SummarySource| {
            sources.insert(field, source);
        };

        macro_rules! resolve {
            ($chain:expr) => {{
                let chain = $chain;
                let (value, source) = chain.resolve(branches);
                take(chain.field(), source);
                value
            }};
        }

        let total_profit = resolve!(total_profit_chain());
        let today_profit = resolve!(today_profit_chain());
        let win_rate = resolve!(win_rate_chain());
        let total_trades = resolve!(total_trades_chain());
        let open_positions = resolve!(open_positions_chain());
        let active_agents = resolve!(active_agents_chain());
        let swarm_status = resolve!(swarm_status_chain());
        let scanner_healthy = resolve!(scanner_healthy_chain());
        let recent_edges = resolve!(recent_edges_chain());
        let recent_trades = resolve!(recent_trades_chain());
        let recent_alerts = resolve!(recent_alerts_chain());

        Self {
            built_at_ms,
            total_profit,
            today_profit,
            win_rate,
            total_trades,
            open_positions,
            active_agents,
            swarm_status,
            scanner_healthy,
            recent_edges,
            recent_trades,
            recent_alerts,
            sources,
            failed_branches: branches.failures(),
        }
    }

    /// Source that supplied `field`.
    pub fn source_of(&self, field: &str) -> Option<SummarySource> {
        self.sources.get(field).copied()
    }

    /// At least one branch failed.
    pub fn is_degraded(&self) -> bool {
        !self.failed_branches.is_empty()
    }
}
