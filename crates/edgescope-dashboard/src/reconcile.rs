//! Reconciliation task.
//!
//! Drains routed stream actions. Whatever is queued when the task wakes is
//! handled as one batch: synthetic inserts first, then one refetch per
//! distinct kind (in first-seen order), then at most one health refresh.
//! A burst of `domain.edge.*` events therefore costs one edges refetch.

use edgescope_core::{EntityKind, Trade};
use edgescope_store::EntityStore;
use edgescope_stream::ReconcileAction;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::aggregator::SummaryCache;
use crate::loader::CollectionLoader;

/// Coalesced work for one batch of actions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub synthetic: Vec<Trade>,
    pub refetch: Vec<EntityKind>,
    pub refresh_health: bool,
}

impl ReconcilePlan {
    pub fn from_actions(actions: impl IntoIterator<Item = ReconcileAction>) -> Self {
        let mut plan = Self::default();
        for action in actions {
            match action {
                ReconcileAction::SyntheticTrade(trade) => plan.synthetic.push(trade),
                ReconcileAction::Refetch(kind) => {
                    if !plan.refetch.contains(&kind) {
                        plan.refetch.push(kind);
                    }
                }
                ReconcileAction::RefreshHealth => plan.refresh_health = true,
            }
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.synthetic.is_empty() && self.refetch.is_empty() && !self.refresh_health
    }
}

#[derive(Clone)]
pub struct Reconciler {
    store: EntityStore,
    loader: CollectionLoader,
    summary: SummaryCache,
}

impl Reconciler {
    pub fn new(store: EntityStore, loader: CollectionLoader, summary: SummaryCache) -> Self {
        Self {
            store,
            loader,
            summary,
        }
    }

    /// Execute one plan. Failures are logged by the loader and aggregator.
    pub async fn apply(&self, plan: ReconcilePlan) {
        for trade in plan.synthetic {
            let id = trade.id.clone();
            match self.store.insert_synthetic(trade) {
                Ok(true) => debug!(id = %id, "Synthetic trade inserted"),
                Ok(false) => debug!(id = %id, "Trade already represented, synthetic skipped"),
                Err(e) => warn!(id = %id, error = %e, "Synthetic trade rejected"),
            }
        }

        for kind in plan.refetch {
            if let Err(e) = self.loader.refresh_kind(kind).await {
                debug!(%kind, error = %e, "Refetch after push event failed");
            }
        }

        if plan.refresh_health {
            self.summary.refresh().await;
        }
    }

    /// Run until the action channel closes.
    pub async fn run(self, mut actions: mpsc::Receiver<ReconcileAction>) {
        while let Some(first) = actions.recv().await {
            let mut batch = vec![first];
            while let Ok(next) = actions.try_recv() {
                batch.push(next);
            }

            let plan = ReconcilePlan::from_actions(batch);
            debug!(
                synthetic = plan.synthetic.len(),
                refetch = ?plan.refetch,
                refresh_health = plan.refresh_health,
                "Reconciling"
            );
            self.apply(plan).await;
        }
        debug!("Reconcile channel closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{FetchAggregator, RecentLimits};
    use chrono::Utc;
    use edgescope_client::{Api, MockEndpointClient};
    use edgescope_core::{ApiEnvelope, Entity};
    use serde_json::json;
    use std::sync::Arc;

    fn reconciler(mock: &Arc<MockEndpointClient>, store: &EntityStore) -> Reconciler {
        let api = Api::new(mock.clone());
        let limits = RecentLimits {
            edges: 5,
            trades: 5,
            alerts: 5,
        };
        Reconciler::new(
            store.clone(),
            CollectionLoader::new(api.clone(), store.clone()),
            SummaryCache::new(FetchAggregator::new(api, limits)),
        )
    }

    fn synthetic(edge_id: &str) -> Trade {
        Trade::synthetic(edge_id, None, None, Utc::now()).unwrap()
    }

    #[test]
    fn test_plan_coalesces_refetches() {
        let plan = ReconcilePlan::from_actions(vec![
            ReconcileAction::Refetch(EntityKind::Edge),
            ReconcileAction::SyntheticTrade(synthetic("E1")),
            ReconcileAction::Refetch(EntityKind::Trade),
            ReconcileAction::Refetch(EntityKind::Edge),
            ReconcileAction::RefreshHealth,
            ReconcileAction::RefreshHealth,
        ]);

        assert_eq!(plan.synthetic.len(), 1);
        assert_eq!(plan.refetch, vec![EntityKind::Edge, EntityKind::Trade]);
        assert!(plan.refresh_health);
        assert!(ReconcilePlan::default().is_empty());
    }

    #[tokio::test]
    async fn test_synthetic_then_authoritative_leaves_one_trade() {
        let mock = Arc::new(MockEndpointClient::new());
        let store = EntityStore::new();
        mock.set_response(
            "/api/trades",
            ApiEnvelope::ok(json!([{"id": "T9", "edge_id": "E1", "status": "open"}])),
        );

        let reconciler = reconciler(&mock, &store);
        reconciler
            .apply(ReconcilePlan {
                synthetic: vec![synthetic("E1")],
                ..Default::default()
            })
            .await;
        let trades = store.get::<Trade>();
        assert_eq!(trades.len(), 1);
        assert!(trades[0].is_synthetic());

        reconciler
            .apply(ReconcilePlan {
                refetch: vec![EntityKind::Trade],
                ..Default::default()
            })
            .await;
        let trades = store.get::<Trade>();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].id, "T9");
    }

    #[tokio::test]
    async fn test_run_drains_until_closed() {
        let mock = Arc::new(MockEndpointClient::new());
        let store = EntityStore::new();
        mock.set_response("/api/positions", ApiEnvelope::ok(json!([{"id": "P1"}])));

        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(reconciler(&mock, &store).run(rx));

        tx.send(ReconcileAction::Refetch(EntityKind::Position))
            .await
            .unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(store.len::<edgescope_core::Position>(), 1);
        assert_eq!(mock.call_count("/api/positions"), 1);
    }
}
