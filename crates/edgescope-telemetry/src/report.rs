//! Session statistics read back from the metric registry.
//!
//! Logged on shutdown of a watch session.

use chrono::{DateTime, Utc};
use prometheus::core::Collector;
use prometheus::CounterVec;
use serde::Serialize;
use tracing::info;

use crate::metrics::{
    COLLECTION_REFRESH_TOTAL, OPTIMISTIC_ROLLBACK_TOTAL, STREAM_DROPPED_TOTAL,
    STREAM_RECONNECT_TOTAL, STREAM_ROUTED_TOTAL, SUMMARY_BRANCH_FAILED_TOTAL,
};

/// Counter totals since process start.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    pub started_at: Option<DateTime<Utc>>,
    pub reconnects: u64,
    pub dropped_messages: u64,
    pub routed_messages: u64,
    pub branch_failures: u64,
    pub rollbacks: u64,
    pub refreshes_ok: u64,
    pub refreshes_failed: u64,
}

impl SessionStats {
    /// Read current totals across all label values.
    pub fn collect(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at: Some(started_at),
            reconnects: counter_total(&STREAM_RECONNECT_TOTAL),
            dropped_messages: counter_total(&STREAM_DROPPED_TOTAL),
            routed_messages: counter_total(&STREAM_ROUTED_TOTAL),
            branch_failures: counter_total(&SUMMARY_BRANCH_FAILED_TOTAL),
            rollbacks: counter_total(&OPTIMISTIC_ROLLBACK_TOTAL),
            refreshes_ok: counter_total_where(&COLLECTION_REFRESH_TOTAL, "outcome", "ok"),
            refreshes_failed: counter_total_where(&COLLECTION_REFRESH_TOTAL, "outcome", "failed"),
        }
    }

    /// Output statistics to logs.
    pub fn log_summary(&self) {
        let minutes = self
            .started_at
            .map(|t| (Utc::now() - t).num_minutes())
            .unwrap_or(0);

        info!(
            minutes,
            reconnects = self.reconnects,
            dropped_messages = self.dropped_messages,
            routed_messages = self.routed_messages,
            branch_failures = self.branch_failures,
            rollbacks = self.rollbacks,
            refreshes_ok = self.refreshes_ok,
            refreshes_failed = self.refreshes_failed,
            "Session statistics"
        );
    }
}

fn counter_total(counter: &CounterVec) -> u64 {
    counter
        .collect()
        .iter()
        .flat_map(|family| family.get_metric())
        .map(|m| m.get_counter().get_value())
        .sum::<f64>() as u64
}

fn counter_total_where(counter: &CounterVec, label: &str, value: &str) -> u64 {
    counter
        .collect()
        .iter()
        .flat_map(|family| family.get_metric())
        .filter(|m| {
            m.get_label()
                .iter()
                .any(|pair| pair.get_name() == label && pair.get_value() == value)
        })
        .map(|m| m.get_counter().get_value())
        .sum::<f64>() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use edgescope_core::EntityKind;

    #[test]
    fn test_collect_sums_across_labels() {
        let before = SessionStats::collect(Utc::now());

        Metrics::collection_refresh(EntityKind::Edge, true);
        Metrics::collection_refresh(EntityKind::Trade, true);
        Metrics::collection_refresh(EntityKind::Trade, false);

        let after = SessionStats::collect(Utc::now());
        assert_eq!(after.refreshes_ok - before.refreshes_ok, 2);
        assert_eq!(after.refreshes_failed - before.refreshes_failed, 1);
    }
}
