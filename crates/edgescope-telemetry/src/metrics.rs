//! Prometheus metrics for the edgescope client.
//!
//! Covers:
//! - Push stream connection state and reconnects
//! - Dropped push messages
//! - Summary branch failures
//! - Optimistic rollbacks
//! - Collection refreshes and sizes
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a startup bug. These panics only occur
//! during static initialization, never at runtime.

use edgescope_core::EntityKind;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, CounterVec, Encoder, Gauge,
    GaugeVec, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Stream connection state (1 = connected, 0 = not connected).
pub static STREAM_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "edgescope_stream_connected",
        "Push stream connection state (1=connected)"
    )
    .unwrap()
});

/// Stream state machine current state.
/// Labels: state (disconnected/connecting/connected/reconnecting)
pub static STREAM_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "edgescope_stream_state",
        "Push stream state machine current state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

/// Scheduled reconnects.
/// Labels: reason (error/closed)
pub static STREAM_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "edgescope_stream_reconnect_total",
        "Total push stream reconnects scheduled",
        &["reason"]
    )
    .unwrap()
});

/// Push messages dropped before routing.
/// Labels: reason (invalid_json/invalid_envelope/missing_topic/invalid_payload/superseded)
pub static STREAM_DROPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "edgescope_stream_dropped_total",
        "Total push messages dropped",
        &["reason"]
    )
    .unwrap()
});

/// Push messages routed to a reconciliation action.
/// Labels: action (refetch/synthetic/health/ignored)
pub static STREAM_ROUTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "edgescope_stream_routed_total",
        "Total push messages routed by action",
        &["action"]
    )
    .unwrap()
});

/// Summary branches that failed or returned success:false.
/// Labels: branch
pub static SUMMARY_BRANCH_FAILED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "edgescope_summary_branch_failed_total",
        "Total failed summary aggregation branches",
        &["branch"]
    )
    .unwrap()
});

/// Optimistic mutations rolled back to the failure status.
/// Labels: kind
pub static OPTIMISTIC_ROLLBACK_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "edgescope_optimistic_rollback_total",
        "Total optimistic mutations rolled back",
        &["kind"]
    )
    .unwrap()
});

/// Authoritative collection refreshes.
/// Labels: kind, outcome (ok/failed)
pub static COLLECTION_REFRESH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "edgescope_collection_refresh_total",
        "Total authoritative collection refreshes",
        &["kind", "outcome"]
    )
    .unwrap()
});

/// Entities currently held per collection.
/// Labels: kind
pub static COLLECTION_SIZE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "edgescope_collection_size",
        "Entities currently held per collection",
        &["kind"]
    )
    .unwrap()
});

const STREAM_STATES: [&str; 4] = ["disconnected", "connecting", "connected", "reconnecting"];

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    /// Record stream connected.
    pub fn stream_connected() {
        STREAM_CONNECTED.set(1.0);
    }

    /// Record stream not connected.
    pub fn stream_disconnected() {
        STREAM_CONNECTED.set(0.0);
    }

    /// Set stream state machine state.
    /// Only the active state is 1, all others are 0.
    pub fn stream_state_set(state: &str) {
        for s in STREAM_STATES {
            STREAM_STATE.with_label_values(&[s]).set(0.0);
        }
        STREAM_STATE.with_label_values(&[state]).set(1.0);
    }

    /// Record a scheduled reconnect.
    pub fn stream_reconnect(reason: &str) {
        STREAM_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record a dropped push message.
    pub fn stream_message_dropped(reason: &str) {
        STREAM_DROPPED_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record a routed push message.
    pub fn stream_message_routed(action: &str) {
        STREAM_ROUTED_TOTAL.with_label_values(&[action]).inc();
    }

    /// Record a failed summary branch.
    pub fn summary_branch_failed(branch: &str) {
        SUMMARY_BRANCH_FAILED_TOTAL
            .with_label_values(&[branch])
            .inc();
    }

    /// Record an optimistic rollback.
    pub fn optimistic_rollback(kind: EntityKind) {
        OPTIMISTIC_ROLLBACK_TOTAL
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    /// Record an authoritative refresh outcome.
    pub fn collection_refresh(kind: EntityKind, ok: bool) {
        let outcome = if ok { "ok" } else { "failed" };
        COLLECTION_REFRESH_TOTAL
            .with_label_values(&[kind.as_str(), outcome])
            .inc();
    }

    /// Set the current size of a collection.
    pub fn collection_size(kind: EntityKind, size: usize) {
        COLLECTION_SIZE
            .with_label_values(&[kind.as_str()])
            .set(size as f64);
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_state_is_exclusive() {
        Metrics::stream_state_set("reconnecting");
        Metrics::stream_state_set("connected");

        assert_eq!(STREAM_STATE.with_label_values(&["connected"]).get(), 1.0);
        assert_eq!(STREAM_STATE.with_label_values(&["reconnecting"]).get(), 0.0);
    }

    #[test]
    fn test_collection_size_by_kind() {
        Metrics::collection_size(EntityKind::Kol, 3);
        assert_eq!(COLLECTION_SIZE.with_label_values(&["kols"]).get(), 3.0);
    }

    #[test]
    fn test_render_contains_registered_metrics() {
        Metrics::stream_message_dropped("invalid_json");
        let text = Metrics::render().unwrap();
        assert!(text.contains("edgescope_stream_dropped_total"));
    }
}
