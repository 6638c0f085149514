//! Application wiring and run loop.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use edgescope_client::{DynEndpointClient, HttpEndpointClient};
use edgescope_dashboard::DashboardSession;
use edgescope_stream::{ConnectionState, DynPushTransport, StreamConfig, TopicRouter, WsTransport};
use edgescope_telemetry::SessionStats;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::AppResult;

pub struct Application {
    config: AppConfig,
    session: DashboardSession,
}

impl Application {
    /// Build against the configured REST and WebSocket endpoints.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let client = HttpEndpointClient::new(config.api.base_url.clone(), config.request_timeout())?;
        Ok(Self::with_transports(
            config,
            Arc::new(client),
            Arc::new(WsTransport::new()),
        ))
    }

    /// Build with explicit transports.
    pub fn with_transports(
        config: AppConfig,
        client: DynEndpointClient,
        transport: DynPushTransport,
    ) -> Self {
        let session = DashboardSession::new(
            &config.dashboard,
            client,
            StreamConfig::from(&config.stream),
            transport,
            TopicRouter::new(config.stream.namespace.clone()),
        );
        Self { config, session }
    }

    pub fn session(&self) -> &DashboardSession {
        &self.session
    }

    /// Initial load of every configured collection plus the summary.
    pub async fn load(&self) {
        let kinds = &self.config.collections.kinds;
        let failures = self.session.refresh_all(kinds).await;
        if failures.is_empty() {
            info!(collections = kinds.len(), "Collections loaded");
        } else {
            warn!(
                collections = kinds.len(),
                failed = failures.len(),
                "Some collections failed to load"
            );
        }

        let summary = self.session.refresh_summary().await;
        info!(
            total_profit = %summary.total_profit,
            win_rate = summary.win_rate,
            swarm_status = %summary.swarm_status,
            degraded = summary.is_degraded(),
            "Summary loaded"
        );
    }

    /// One-shot composite summary as pretty JSON.
    pub async fn summary_json(&self) -> AppResult<String> {
        let summary = self.session.refresh_summary().await;
        Ok(serde_json::to_string_pretty(&summary)?)
    }

    /// Watch until Ctrl-C.
    pub async fn run(&self) -> AppResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(?e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Watch until `shutdown` resolves.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> AppResult<()> {
        let started_at = Utc::now();

        self.load().await;
        self.session.connect(self.config.stream.topics.clone()).await;

        let mut summary_interval = tokio::time::interval(self.config.summary_interval());
        // The first tick fires immediately; the summary was just loaded.
        summary_interval.tick().await;
        let mut revisions = self.session.subscribe_revisions();
        let mut states = self.session.subscribe_state();
        tokio::pin!(shutdown);

        info!("Entering watch loop");
        loop {
            tokio::select! {
                _ = summary_interval.tick() => {
                    let summary = self.session.refresh_summary().await;
                    debug!(failed = summary.failed_branches.len(), "Summary refreshed");
                }

                changed = revisions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.log_view();
                }

                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *states.borrow_and_update();
                    if state == ConnectionState::Disconnected {
                        warn!("Push stream stopped reconnecting, dashboard is no longer live");
                    }
                }

                () = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.session.disconnect().await;
        SessionStats::collect(started_at).log_summary();
        Ok(())
    }

    fn log_view(&self) {
        let view = self.session.view();
        info!(
            revision = view.revision,
            connection = %view.connection,
            edges = view.edges.len(),
            trades = view.trades.len(),
            pending_edges = view.counts.pending_edges,
            open_positions = view.counts.open_positions,
            unresolved_alerts = view.counts.unresolved_alerts,
            synthetic_trades = view.counts.synthetic_trades,
            load_errors = view.load_errors.len(),
            "Dashboard updated"
        );
    }
}
