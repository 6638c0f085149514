//! Dashboard configuration.

use std::collections::HashMap;

use edgescope_core::EntityKind;
use edgescope_store::InsertPolicy;
use serde::{Deserialize, Serialize};

/// Summary and collection settings for a dashboard session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// How often the composite summary is rebuilt (milliseconds).
    #[serde(default = "default_summary_refresh_interval_ms")]
    pub summary_refresh_interval_ms: u64,
    /// Recent edges shown in the summary.
    #[serde(default = "default_recent_limit")]
    pub recent_edges_limit: usize,
    /// Recent trades shown in the summary.
    #[serde(default = "default_recent_limit")]
    pub recent_trades_limit: usize,
    /// Recent threat alerts shown in the summary.
    #[serde(default = "default_recent_limit")]
    pub recent_alerts_limit: usize,
    /// Insert policy overrides keyed by collection name (`"kols"`).
    /// Unlisted collections prepend.
    #[serde(default)]
    pub insert_policies: HashMap<String, InsertPolicy>,
    /// Routed stream actions buffered before the consumer waits.
    #[serde(default = "default_action_buffer")]
    pub action_buffer: usize,
}

fn default_summary_refresh_interval_ms() -> u64 {
    15_000
}

fn default_recent_limit() -> usize {
    10
}

fn default_action_buffer() -> usize {
    256
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            summary_refresh_interval_ms: default_summary_refresh_interval_ms(),
            recent_edges_limit: default_recent_limit(),
            recent_trades_limit: default_recent_limit(),
            recent_alerts_limit: default_recent_limit(),
            insert_policies: HashMap::new(),
            action_buffer: default_action_buffer(),
        }
    }
}

impl DashboardConfig {
    /// Effective insert policy for a kind.
    pub fn policy_for(&self, kind: EntityKind) -> InsertPolicy {
        self.insert_policies
            .get(kind.as_str())
            .copied()
            .unwrap_or_default()
    }
}
