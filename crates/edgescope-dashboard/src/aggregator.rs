//! Fetch aggregator.
//!
//! Fan-out/fan-in over six endpoint calls with per-branch isolation. The
//! aggregate is only as slow as the slowest branch and never fails: a
//! branch that errors or answers `success:false` contributes defaults.
//! No timeout is added here; each branch inherits the endpoint client's.

use std::sync::Arc;

use chrono::Utc;
use edgescope_client::Api;
use edgescope_core::{Edge, ThreatAlert, Trade};
use edgescope_telemetry::Metrics;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::DashboardConfig;
use crate::summary::{BranchResult, CompositeSummary, SummaryBranches};

/// Recent-list sizes requested by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecentLimits {
    pub edges: usize,
    pub trades: usize,
    pub alerts: usize,
}

impl From<&DashboardConfig> for RecentLimits {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            edges: config.recent_edges_limit,
            trades: config.recent_trades_limit,
            alerts: config.recent_alerts_limit,
        }
    }
}

/// Builds the composite summary. Never touches the entity store.
#[derive(Clone)]
pub struct FetchAggregator {
    api: Api,
    limits: RecentLimits,
}

impl FetchAggregator {
    pub fn new(api: Api, limits: RecentLimits) -> Self {
        Self { api, limits }
    }

    /// Issue all six branches concurrently and wait for every one to settle.
    pub async fn fetch_branches(&self) -> SummaryBranches {
        let (trade_stats, swarm, recent_edges, recent_trades, recent_alerts, pnl) = tokio::join!(
            self.api.trade_stats(),
            self.api.swarm_health(),
            self.api.recent::<Edge>(self.limits.edges),
            self.api.recent::<Trade>(self.limits.trades),
            self.api.recent::<ThreatAlert>(self.limits.alerts),
            self.api.pnl_summary(),
        );

        SummaryBranches {
            trade_stats: BranchResult::from_call(trade_stats),
            swarm: BranchResult::from_call(swarm),
            recent_edges: BranchResult::from_call(recent_edges),
            recent_trades: BranchResult::from_call(recent_trades),
            recent_alerts: BranchResult::from_call(recent_alerts),
            pnl: BranchResult::from_call(pnl),
        }
    }

    /// Build the composite summary. Always resolves.
    pub async fn build_summary(&self) -> CompositeSummary {
        let branches = self.fetch_branches().await;

        for failed in branches.failures() {
            Metrics::summary_branch_failed(failed.source.as_str());
            warn!(
                branch = %failed.source,
                reason = %failed.reason,
                "Summary branch failed, using defaults"
            );
        }

        let summary = CompositeSummary::from_branches(&branches, Utc::now().timestamp_millis());
        debug!(
            failed = summary.failed_branches.len(),
            total_profit = %summary.total_profit,
            "Summary built"
        );
        summary
    }
}

/// Aggregator plus the last summary it built.
#[derive(Clone)]
pub struct SummaryCache {
    aggregator: FetchAggregator,
    latest: Arc<RwLock<Option<CompositeSummary>>>,
}

impl SummaryCache {
    pub fn new(aggregator: FetchAggregator) -> Self {
        Self {
            aggregator,
            latest: Arc::new(RwLock::new(None)),
        }
    }

    /// Rebuild and store the summary.
    pub async fn refresh(&self) -> CompositeSummary {
        let summary = self.aggregator.build_summary().await;
        *self.latest.write() = Some(summary.clone());
        summary
    }

    pub fn latest(&self) -> Option<CompositeSummary> {
        self.latest.read().clone()
    }
}
