//! Event stream consumer.
//!
//! Owns the single push connection. A driver task per `connect()` reads
//! transport events from a channel, feeds them through the state machine,
//! parses and routes messages, and sends the resulting reconciliation
//! actions to the application on an mpsc channel.
//!
//! `connect()` tears down any previous driver before starting a new one,
//! so at most one connection is live at a time. Concurrent `connect()` and
//! `disconnect()` calls are serialized on the driver slot. `disconnect()` is
//! terminal: pending reconnect timers are cancelled and nothing reconnects
//! until the next `connect()`.

use std::sync::Arc;

use edgescope_telemetry::Metrics;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::ReconnectPolicy;
use crate::message::StreamEnvelope;
use crate::router::{ReconcileAction, TopicRouter};
use crate::state::{ConnectionState, ErrorAction, StreamStateMachine};
use crate::transport::{DynPushTransport, PushConnection, TransportEvent};

/// Buffer for events of one connection attempt.
const EVENT_BUFFER: usize = 256;

/// Consumer configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Push endpoint URL.
    pub url: String,
    pub policy: ReconnectPolicy,
}

struct Shared {
    url: String,
    transport: DynPushTransport,
    router: TopicRouter,
    actions_tx: mpsc::Sender<ReconcileAction>,
    machine: Mutex<StreamStateMachine>,
    state_tx: watch::Sender<ConnectionState>,
}

impl Shared {
    /// Publish the machine's current state if it changed.
    ///
    /// Sent under the machine lock so publishes land in transition order.
    fn publish(&self) {
        let machine = self.machine.lock();
        let state = machine.state();
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        drop(machine);

        if changed {
            info!(state = %state, "Stream state changed");
            Metrics::stream_state_set(state.as_str());
            if state.is_connected() {
                Metrics::stream_connected();
            } else {
                Metrics::stream_disconnected();
            }
        }
    }

    async fn handle_text(&self, text: &str, generation: u64) {
        if !self.machine.lock().is_current(generation) {
            debug!(generation, "Dropping message from superseded connection");
            Metrics::stream_message_dropped("superseded");
            return;
        }

        let envelope = match StreamEnvelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(reason = e.drop_reason(), error = %e, "Dropping push message");
                Metrics::stream_message_dropped(e.drop_reason());
                return;
            }
        };

        let actions = self.router.route(&envelope);

        if actions.is_empty() {
            Metrics::stream_message_routed("ignored");
            return;
        }

        debug!(topic = %envelope.topic, count = actions.len(), "Routed push message");
        for action in actions {
            Metrics::stream_message_routed(action_label(&action));
            if self.actions_tx.send(action).await.is_err() {
                warn!("Reconcile action receiver dropped");
                return;
            }
        }
    }
}

fn action_label(action: &ReconcileAction) -> &'static str {
    match action {
        ReconcileAction::Refetch(_) => "refetch",
        ReconcileAction::SyntheticTrade(_) => "synthetic",
        ReconcileAction::RefreshHealth => "health",
    }
}

struct Driver {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// Single-connection push stream consumer.
pub struct StreamConsumer {
    shared: Arc<Shared>,
    /// Held across teardown and spawn.
    driver: AsyncMutex<Option<Driver>>,
}

impl StreamConsumer {
    /// Create a consumer. Routed actions are sent on `actions_tx`.
    pub fn new(
        config: StreamConfig,
        transport: DynPushTransport,
        router: TopicRouter,
        actions_tx: mpsc::Sender<ReconcileAction>,
    ) -> Self {
        let (state_tx, _state_rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                url: config.url,
                transport,
                router,
                actions_tx,
                machine: Mutex::new(StreamStateMachine::new(config.policy)),
                state_tx,
            }),
            driver: AsyncMutex::new(None),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    /// Receiver notified on every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// (Re)connect and subscribe to `topics`. Any previous connection is
    /// torn down first.
    pub async fn connect(&self, topics: Vec<String>) {
        let mut slot = self.driver.lock().await;
        stop_driver(slot.take()).await;

        let generation = self.shared.machine.lock().connect();
        self.shared.publish();
        info!(url = %self.shared.url, topics = ?topics, generation, "Connecting push stream");

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(drive(
            self.shared.clone(),
            topics,
            generation,
            shutdown.clone(),
        ));
        *slot = Some(Driver { shutdown, task });
    }

    /// Disconnect. No reconnect happens until the next `connect()`.
    pub async fn disconnect(&self) {
        let mut slot = self.driver.lock().await;
        stop_driver(slot.take()).await;

        self.shared.machine.lock().disconnect();
        self.shared.publish();
        info!("Push stream disconnected");
    }
}

async fn stop_driver(driver: Option<Driver>) {
    if let Some(driver) = driver {
        driver.shutdown.cancel();
        if let Err(e) = driver.task.await {
            warn!(?e, "Stream driver task ended abnormally");
        }
    }
}

impl Drop for StreamConsumer {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.get_mut().take() {
            driver.shutdown.cancel();
        }
    }
}

/// How one connection attempt ended.
enum AttemptEnd {
    Shutdown,
    Errored(String),
    Closed,
}

impl AttemptEnd {
    fn reason(&self) -> &str {
        match self {
            Self::Shutdown => "shutdown",
            Self::Errored(reason) => reason,
            Self::Closed => "closed",
        }
    }

    fn metric_label(&self) -> &'static str {
        match self {
            Self::Errored(_) => "error",
            _ => "closed",
        }
    }
}

async fn run_attempt(
    shared: &Shared,
    connection: &mut Box<dyn PushConnection>,
    events_rx: &mut mpsc::Receiver<TransportEvent>,
    generation: u64,
    shutdown: &CancellationToken,
) -> AttemptEnd {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                connection.close();
                return AttemptEnd::Shutdown;
            }

            event = events_rx.recv() => match event {
                Some(TransportEvent::Opened) => {
                    if shared.machine.lock().on_open(generation) {
                        shared.publish();
                    }
                }
                Some(TransportEvent::Message(text)) => shared.handle_text(&text, generation).await,
                Some(TransportEvent::Error(reason)) => return AttemptEnd::Errored(reason),
                Some(TransportEvent::Closed) | None => return AttemptEnd::Closed,
            },
        }
    }
}

async fn drive(
    shared: Arc<Shared>,
    topics: Vec<String>,
    mut generation: u64,
    shutdown: CancellationToken,
) {
    loop {
        let (events_tx, mut events_rx) = mpsc::channel(EVENT_BUFFER);
        let mut connection = shared.transport.open(&shared.url, &topics, events_tx);

        let end = run_attempt(
            &shared,
            &mut connection,
            &mut events_rx,
            generation,
            &shutdown,
        )
        .await;
        if matches!(end, AttemptEnd::Shutdown) {
            return;
        }
        connection.close();

        let action = shared.machine.lock().on_error(generation);
        let delay = match action {
            ErrorAction::Reconnect { attempt, delay } => {
                shared.publish();
                Metrics::stream_reconnect(end.metric_label());
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    reason = end.reason(),
                    "Reconnecting"
                );
                delay
            }
            ErrorAction::GiveUp { attempts } => {
                shared.publish();
                error!(attempts, reason = end.reason(), "Max reconnection attempts reached");
                return;
            }
            ErrorAction::Ignore => {
                debug!(generation, "Superseded connection ended");
                return;
            }
        };

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = shutdown.cancelled() => {
                debug!("Shutdown requested during backoff");
                return;
            }
        }

        let next = shared.machine.lock().on_timer(generation);
        match next {
            Some(next) => {
                generation = next;
                shared.publish();
            }
            None => {
                debug!(generation, "Stale reconnect timer ignored");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{OpenRecord, ScriptedTransport};
    use edgescope_core::EntityKind;
    use std::time::Duration;

    fn consumer_with(
        transport: Arc<ScriptedTransport>,
        base_ms: u64,
        max_attempts: u32,
    ) -> (StreamConsumer, mpsc::Receiver<ReconcileAction>) {
        let (tx, rx) = mpsc::channel(64);
        let config = StreamConfig {
            url: "ws://scripted".to_string(),
            policy: ReconnectPolicy::from_millis(base_ms, base_ms * 8, max_attempts),
        };
        (
            StreamConsumer::new(config, transport, TopicRouter::default(), tx),
            rx,
        )
    }

    async fn wait_for_state(consumer: &StreamConsumer, state: ConnectionState) {
        let mut rx = consumer.subscribe_state();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| *s == state))
            .await
            .expect("timed out waiting for state")
            .expect("state channel closed");
    }

    async fn wait_for_opens(transport: &ScriptedTransport, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while transport.open_count() < count {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("timed out waiting for open");
    }

    #[tokio::test]
    async fn test_connect_open_and_route() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_script(vec![
            TransportEvent::Opened,
            TransportEvent::Message(r#"{"topic":"domain.strategy.updated","payload":{}}"#.to_string()),
        ]);
        let (consumer, mut actions) = consumer_with(transport.clone(), 10, 0);

        consumer.connect(vec!["domain.strategy".to_string()]).await;
        wait_for_state(&consumer, ConnectionState::Connected).await;

        let action = tokio::time::timeout(Duration::from_secs(1), actions.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(action, ReconcileAction::Refetch(EntityKind::Strategy));
        assert_eq!(transport.last_open().unwrap().topics, vec!["domain.strategy".to_string()]);
    }

    #[tokio::test]
    async fn test_malformed_message_keeps_connection() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_script(vec![
            TransportEvent::Opened,
            TransportEvent::Message("{not json".to_string()),
            TransportEvent::Message(r#"{"payload":{}}"#.to_string()),
            TransportEvent::Message(r#"{"topic":"domain.kol.added","payload":{}}"#.to_string()),
        ]);
        let (consumer, mut actions) = consumer_with(transport.clone(), 10, 0);

        consumer.connect(vec![]).await;

        let action = tokio::time::timeout(Duration::from_secs(1), actions.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(action, ReconcileAction::Refetch(EntityKind::Kol));
        assert_eq!(consumer.state(), ConnectionState::Connected);
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn test_error_reconnects_with_backoff() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_script(vec![TransportEvent::Opened, TransportEvent::Error("reset".into())]);
        transport.push_script(vec![TransportEvent::Opened]);
        let (consumer, _actions) = consumer_with(transport.clone(), 5, 0);

        consumer.connect(vec![]).await;
        wait_for_opens(&transport, 2).await;
        wait_for_state(&consumer, ConnectionState::Connected).await;

        assert!(transport.opens()[0].is_closed());
        assert!(!transport.opens()[1].is_closed());
    }

    #[tokio::test]
    async fn test_disconnect_cancels_pending_reconnect() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_script(vec![TransportEvent::Error("refused".into())]);
        let (consumer, _actions) = consumer_with(transport.clone(), 50, 0);

        consumer.connect(vec![]).await;
        wait_for_state(&consumer, ConnectionState::Reconnecting).await;

        consumer.disconnect().await;
        assert_eq!(consumer.state(), ConnectionState::Disconnected);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(transport.open_count(), 1);
        assert_eq!(consumer.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_reconnect_while_backing_off_opens_single_connection() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_script(vec![TransportEvent::Error("refused".into())]);
        transport.push_script(vec![TransportEvent::Opened]);
        let (consumer, _actions) = consumer_with(transport.clone(), 50, 0);

        consumer.connect(vec![]).await;
        wait_for_state(&consumer, ConnectionState::Reconnecting).await;

        consumer.connect(vec![]).await;
        wait_for_state(&consumer, ConnectionState::Connected).await;

        // Old backoff (50ms) would have fired by now.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(transport.open_count(), 2);
        assert_eq!(consumer.state(), ConnectionState::Connected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_connects_leave_one_live_connection() {
        for _ in 0..50 {
            let transport = Arc::new(ScriptedTransport::new());
            let (consumer, _actions) = consumer_with(transport.clone(), 10, 0);
            let consumer = Arc::new(consumer);
            consumer.connect(vec![]).await;

            let barrier = Arc::new(tokio::sync::Barrier::new(2));
            let tasks: Vec<_> = (0..2)
                .map(|_| {
                    let consumer = consumer.clone();
                    let barrier = barrier.clone();
                    tokio::spawn(async move {
                        barrier.wait().await;
                        consumer.connect(vec![]).await;
                    })
                })
                .collect();
            for task in tasks {
                task.await.unwrap();
            }

            wait_for_opens(&transport, 3).await;
            let live = transport.opens().iter().filter(|o| !o.is_closed()).count();
            assert_eq!(live, 1);

            consumer.disconnect().await;
            assert!(transport.opens().iter().all(OpenRecord::is_closed));
            assert_eq!(consumer.state(), ConnectionState::Disconnected);
        }
    }

    #[tokio::test]
    async fn test_attempt_cap_ends_disconnected() {
        let transport = Arc::new(ScriptedTransport::new());
        for _ in 0..3 {
            transport.push_script(vec![TransportEvent::Error("refused".into())]);
        }
        let (consumer, _actions) = consumer_with(transport.clone(), 2, 2);

        consumer.connect(vec![]).await;
        wait_for_opens(&transport, 3).await;
        wait_for_state(&consumer, ConnectionState::Disconnected).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.open_count(), 3);
    }
}
