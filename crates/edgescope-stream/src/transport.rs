//! Push transport.
//!
//! A transport turns one connection attempt into a stream of
//! [`TransportEvent`]s on an mpsc channel. The consumer owns the state
//! machine; transports never reconnect on their own.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Callback-equivalent events of one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Error(String),
    Closed,
}

/// Handle to one live connection attempt.
pub trait PushConnection: Send {
    /// Tear the connection down. No further events are delivered.
    fn close(&mut self);
}

/// Opens push connections.
pub trait PushTransport: Send + Sync {
    /// Start one connection attempt. Returns immediately; progress arrives
    /// on `events`.
    fn open(
        &self,
        url: &str,
        topics: &[String],
        events: mpsc::Sender<TransportEvent>,
    ) -> Box<dyn PushConnection>;
}

/// Arc wrapper for PushTransport trait objects.
pub type DynPushTransport = Arc<dyn PushTransport>;

/// Subscribe frame sent after the socket opens.
pub fn subscribe_frame(topics: &[String]) -> String {
    json!({ "method": "subscribe", "topics": topics }).to_string()
}

// ============================================================================
// WebSocket transport
// ============================================================================

/// tokio-tungstenite transport.
#[derive(Debug, Default, Clone)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

struct WsConnection {
    token: CancellationToken,
}

impl PushConnection for WsConnection {
    fn close(&mut self) {
        self.token.cancel();
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl PushTransport for WsTransport {
    fn open(
        &self,
        url: &str,
        topics: &[String],
        events: mpsc::Sender<TransportEvent>,
    ) -> Box<dyn PushConnection> {
        let token = CancellationToken::new();
        tokio::spawn(run_socket(
            url.to_string(),
            topics.to_vec(),
            events,
            token.clone(),
        ));
        Box::new(WsConnection { token })
    }
}

async fn run_socket(
    url: String,
    topics: Vec<String>,
    events: mpsc::Sender<TransportEvent>,
    token: CancellationToken,
) {
    info!(url = %url, "Connecting to push stream");

    let connect = connect_async_tls_with_config(&url, None, true, None);
    let ws_stream = tokio::select! {
        () = token.cancelled() => return,
        result = connect => match result {
            Ok((ws_stream, _response)) => ws_stream,
            Err(e) => {
                let _ = events.send(TransportEvent::Error(e.to_string())).await;
                return;
            }
        },
    };
    let (mut write, mut read) = ws_stream.split();

    if events.send(TransportEvent::Opened).await.is_err() {
        return;
    }

    if !topics.is_empty() {
        if let Err(e) = write.send(Message::Text(subscribe_frame(&topics))).await {
            let _ = events.send(TransportEvent::Error(e.to_string())).await;
            return;
        }
        debug!(count = topics.len(), "Subscribe frame sent");
    }

    loop {
        tokio::select! {
            () = token.cancelled() => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!(?e, "Failed to send Close frame");
                }
                return;
            }

            msg = read.next() => {
                let event = match msg {
                    Some(Ok(Message::Text(text))) => TransportEvent::Message(text),
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                        Ok(text) => TransportEvent::Message(text),
                        Err(_) => {
                            debug!("Ignoring non-UTF-8 binary frame");
                            continue;
                        }
                    },
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            TransportEvent::Error(e.to_string())
                        } else {
                            continue;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason): (u16, String) = frame
                            .map(|f| (f.code.into(), f.reason.to_string()))
                            .unwrap_or((1000, "Normal close".to_string()));
                        warn!(code, %reason, "Push stream closed by server");
                        TransportEvent::Closed
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => TransportEvent::Error(e.to_string()),
                    None => TransportEvent::Closed,
                };

                let terminal = matches!(event, TransportEvent::Error(_) | TransportEvent::Closed);
                if events.send(event).await.is_err() || terminal {
                    return;
                }
            }
        }
    }
}

// ============================================================================
// Scripted transport
// ============================================================================

/// One `open` call seen by [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct OpenRecord {
    pub url: String,
    pub topics: Vec<String>,
    pub events: mpsc::Sender<TransportEvent>,
    closed: Arc<AtomicBool>,
}

impl OpenRecord {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct ScriptedConnection {
    closed: Arc<AtomicBool>,
}

impl PushConnection for ScriptedConnection {
    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Transport for tests.
///
/// Each `open` consumes the next queued script (events delivered
/// immediately) and records the attempt so a test can push more events
/// through [`OpenRecord::events`].
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: parking_lot::Mutex<VecDeque<Vec<TransportEvent>>>,
    opens: parking_lot::Mutex<Vec<OpenRecord>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events the next `open` delivers right away.
    pub fn push_script(&self, events: Vec<TransportEvent>) {
        self.scripts.lock().push_back(events);
    }

    pub fn open_count(&self) -> usize {
        self.opens.lock().len()
    }

    pub fn opens(&self) -> Vec<OpenRecord> {
        self.opens.lock().clone()
    }

    pub fn last_open(&self) -> Option<OpenRecord> {
        self.opens.lock().last().cloned()
    }
}

impl PushTransport for ScriptedTransport {
    fn open(
        &self,
        url: &str,
        topics: &[String],
        events: mpsc::Sender<TransportEvent>,
    ) -> Box<dyn PushConnection> {
        let closed = Arc::new(AtomicBool::new(false));

        if let Some(script) = self.scripts.lock().pop_front() {
            for event in script {
                if events.try_send(event).is_err() {
                    warn!("Scripted event dropped, channel full");
                }
            }
        }

        self.opens.lock().push(OpenRecord {
            url: url.to_string(),
            topics: topics.to_vec(),
            events,
            closed: closed.clone(),
        });

        Box::new(ScriptedConnection { closed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_frame_shape() {
        let frame = subscribe_frame(&["domain.edge".to_string(), "domain.trade".to_string()]);
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["method"], "subscribe");
        assert_eq!(value["topics"], json!(["domain.edge", "domain.trade"]));
    }

    #[tokio::test]
    async fn test_scripted_transport_delivers_script_and_records() {
        let transport = ScriptedTransport::new();
        transport.push_script(vec![TransportEvent::Opened]);

        let (tx, mut rx) = mpsc::channel(8);
        let mut conn = transport.open("ws://test", &["domain.edge".to_string()], tx);

        assert_eq!(rx.recv().await, Some(TransportEvent::Opened));
        let record = transport.last_open().unwrap();
        assert_eq!(record.topics, vec!["domain.edge".to_string()]);
        assert!(!record.is_closed());

        conn.close();
        assert!(record.is_closed());
    }
}
