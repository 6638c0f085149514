//! Dashboard session.
//!
//! Explicitly constructed owner of one store and everything that writes to
//! it: collection loads, the summary cache, optimistic actions and the push
//! stream with its reconciliation task. Independent sessions share nothing.

use std::collections::BTreeMap;

use edgescope_client::{Api, DynEndpointClient};
use edgescope_core::{
    AlertStatus, CurveToken, Edge, EdgeStatus, EntityKind, ExecuteOptions, Kol, Position,
    Strategy, StrategyStatus, ThreatAlert, Trade,
};
use edgescope_store::{EntityStore, MutationOutcome, OptimisticController, StoredEntity};
use edgescope_stream::{
    ConnectionState, DynPushTransport, ReconcileAction, StreamConfig, StreamConsumer, TopicRouter,
};
use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::aggregator::{FetchAggregator, RecentLimits, SummaryCache};
use crate::config::DashboardConfig;
use crate::error::{DashboardError, DashboardResult};
use crate::loader::CollectionLoader;
use crate::reconcile::Reconciler;
use crate::summary::CompositeSummary;
use crate::view::DashboardView;

pub struct DashboardSession {
    store: EntityStore,
    api: Api,
    optimistic: OptimisticController,
    loader: CollectionLoader,
    summary: SummaryCache,
    consumer: StreamConsumer,
    reconciler: Reconciler,
    /// Taken when the reconcile task first starts.
    pending_actions: Mutex<Option<mpsc::Receiver<ReconcileAction>>>,
    reconcile_task: Mutex<Option<JoinHandle<()>>>,
}

impl DashboardSession {
    pub fn new(
        config: &DashboardConfig,
        client: DynEndpointClient,
        stream: StreamConfig,
        transport: DynPushTransport,
        router: TopicRouter,
    ) -> Self {
        let store = EntityStore::with_policies(
            EntityKind::ALL
                .iter()
                .map(|kind| (*kind, config.policy_for(*kind))),
        );
        let api = Api::new(client);
        let loader = CollectionLoader::new(api.clone(), store.clone());
        let summary = SummaryCache::new(FetchAggregator::new(
            api.clone(),
            RecentLimits::from(config),
        ));
        let (actions_tx, actions_rx) = mpsc::channel(config.action_buffer.max(1));
        let consumer = StreamConsumer::new(stream, transport, router, actions_tx);
        let reconciler = Reconciler::new(store.clone(), loader.clone(), summary.clone());

        Self {
            optimistic: OptimisticController::new(store.clone()),
            store,
            api,
            loader,
            summary,
            consumer,
            reconciler,
            pending_actions: Mutex::new(Some(actions_rx)),
            reconcile_task: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn api(&self) -> &Api {
        &self.api
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub fn edges(&self) -> Vec<Edge> {
        self.store.get()
    }

    pub fn trades(&self) -> Vec<Trade> {
        self.store.get()
    }

    pub fn strategies(&self) -> Vec<Strategy> {
        self.store.get()
    }

    pub fn positions(&self) -> Vec<Position> {
        self.store.get()
    }

    pub fn threat_alerts(&self) -> Vec<ThreatAlert> {
        self.store.get()
    }

    pub fn kols(&self) -> Vec<Kol> {
        self.store.get()
    }

    pub fn curve_tokens(&self) -> Vec<CurveToken> {
        self.store.get()
    }

    /// Last composite summary, if one has been built.
    pub fn summary(&self) -> Option<CompositeSummary> {
        self.summary.latest()
    }

    /// Primary collection loads currently failing, by kind.
    pub fn load_errors(&self) -> BTreeMap<EntityKind, String> {
        self.loader.load_errors()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.consumer.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.consumer.subscribe_state()
    }

    /// Receiver notified on every store change.
    pub fn subscribe_revisions(&self) -> watch::Receiver<u64> {
        self.store.subscribe()
    }

    /// Compose the current view.
    pub fn view(&self) -> DashboardView {
        DashboardView::compose(
            &self.store.snapshot(),
            self.summary.latest().as_ref(),
            self.consumer.state(),
            &self.loader.load_errors(),
        )
    }

    // ------------------------------------------------------------------------
    // Loads
    // ------------------------------------------------------------------------

    /// Authoritative reload of one collection.
    pub async fn refresh<E: StoredEntity>(&self) -> DashboardResult<usize> {
        self.loader.refresh::<E>().await
    }

    /// Reload several collections concurrently. Returns the failures.
    pub async fn refresh_all(&self, kinds: &[EntityKind]) -> Vec<DashboardError> {
        join_all(kinds.iter().map(|kind| self.loader.refresh_kind(*kind)))
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect()
    }

    pub async fn refresh_summary(&self) -> CompositeSummary {
        self.summary.refresh().await
    }

    // ------------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------------

    pub async fn approve(&self, id: &str) -> MutationOutcome {
        self.optimistic
            .run::<Edge, _>(id, EdgeStatus::Approved, self.api.approve_edge(id))
            .await
    }

    pub async fn reject(&self, id: &str, reason: &str) -> MutationOutcome {
        self.optimistic
            .run::<Edge, _>(id, EdgeStatus::Rejected, self.api.reject_edge(id, reason))
            .await
    }

    pub async fn execute(&self, id: &str, options: &ExecuteOptions) -> MutationOutcome {
        self.optimistic
            .run::<Edge, _>(id, EdgeStatus::Executing, self.api.execute_edge(id, options))
            .await
    }

    pub async fn set_strategy_active(&self, id: &str, active: bool) -> MutationOutcome {
        self.optimistic
            .run::<Strategy, _>(
                id,
                StrategyStatus::Updating,
                self.api.set_strategy_active(id, active),
            )
            .await
    }

    pub async fn acknowledge_alert(&self, id: &str) -> MutationOutcome {
        self.optimistic
            .run::<ThreatAlert, _>(
                id,
                AlertStatus::Acknowledged,
                self.api.acknowledge_alert(id),
            )
            .await
    }

    // ------------------------------------------------------------------------
    // Stream
    // ------------------------------------------------------------------------

    /// Connect the push stream. Replaces any live connection.
    pub async fn connect(&self, topics: Vec<String>) {
        self.start_reconciler();
        self.consumer.connect(topics).await;
    }

    /// Disconnect the push stream. Terminal until the next `connect`.
    pub async fn disconnect(&self) {
        self.consumer.disconnect().await;
    }

    fn start_reconciler(&self) {
        let Some(actions) = self.pending_actions.lock().take() else {
            return;
        };
        let task = tokio::spawn(self.reconciler.clone().run(actions));
        *self.reconcile_task.lock() = Some(task);
        debug!("Reconcile task started");
    }
}

impl Drop for DashboardSession {
    fn drop(&mut self) {
        if let Some(task) = self.reconcile_task.get_mut().take() {
            task.abort();
            info!("Dashboard session closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgescope_client::MockEndpointClient;
    use edgescope_core::ApiEnvelope;
    use edgescope_store::InsertPolicy;
    use edgescope_stream::{ReconnectPolicy, ScriptedTransport};
    use serde_json::json;
    use std::sync::Arc;

    fn session(mock: &Arc<MockEndpointClient>) -> DashboardSession {
        let mut config = DashboardConfig::default();
        config
            .insert_policies
            .insert("kols".to_string(), InsertPolicy::Append);
        DashboardSession::new(
            &config,
            mock.clone(),
            StreamConfig {
                url: "ws://test".to_string(),
                policy: ReconnectPolicy::from_millis(5, 20, 0),
            },
            Arc::new(ScriptedTransport::new()),
            TopicRouter::default(),
        )
    }

    #[tokio::test]
    async fn test_policies_come_from_config() {
        let mock = Arc::new(MockEndpointClient::new());
        let session = session(&mock);
        assert_eq!(session.store().policy(EntityKind::Kol), InsertPolicy::Append);
        assert_eq!(
            session.store().policy(EntityKind::Edge),
            InsertPolicy::Prepend
        );
    }

    #[tokio::test]
    async fn test_approve_rolls_back_on_transport_error() {
        let mock = Arc::new(MockEndpointClient::new());
        let session = session(&mock);
        session.store().upsert(Edge::new("E1", EdgeStatus::PendingApproval));
        mock.set_transport_error("/api/edges/E1/approve", "connection reset");

        let outcome = session.approve("E1").await;

        assert!(matches!(outcome, MutationOutcome::RolledBack { .. }));
        assert_eq!(session.edges()[0].status, EdgeStatus::Failed);
    }

    #[tokio::test]
    async fn test_execute_takes_server_entity() {
        let mock = Arc::new(MockEndpointClient::new());
        let session = session(&mock);
        session.store().upsert(Edge::new("E1", EdgeStatus::Approved));
        mock.set_response(
            "/api/edges/E1/execute",
            ApiEnvelope::ok(json!({"id": "E1", "status": "executed"})),
        );

        let outcome = session.execute("E1", &ExecuteOptions::default()).await;

        assert_eq!(outcome, MutationOutcome::Confirmed);
        assert_eq!(session.edges()[0].status, EdgeStatus::Executed);
    }

    #[tokio::test]
    async fn test_strategy_toggle_accepted_keeps_transient() {
        let mock = Arc::new(MockEndpointClient::new());
        let session = session(&mock);
        session
            .store()
            .upsert(Strategy::new("S1", StrategyStatus::Active));
        mock.set_response("/api/strategies/S1/pause", ApiEnvelope::ok_empty());

        let outcome = session.set_strategy_active("S1", false).await;

        assert_eq!(outcome, MutationOutcome::Accepted);
        assert_eq!(session.strategies()[0].status, StrategyStatus::Updating);
    }

    #[tokio::test]
    async fn test_refresh_all_reports_failures_only() {
        let mock = Arc::new(MockEndpointClient::new());
        let session = session(&mock);
        mock.set_response("/api/edges", ApiEnvelope::ok(json!([{"id": "E1"}])));
        mock.set_response("/api/trades", ApiEnvelope::failure("trades down"));

        let failures = session
            .refresh_all(&[EntityKind::Edge, EntityKind::Trade])
            .await;

        assert_eq!(failures.len(), 1);
        assert_eq!(session.edges().len(), 1);
        let view = session.view();
        assert!(view.has_load_error());
        assert!(view.load_errors.contains_key(&EntityKind::Trade));
        assert_eq!(view.connection, ConnectionState::Disconnected);
    }
}
