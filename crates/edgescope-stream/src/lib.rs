//! Push event stream for the edgescope dashboard client.
//!
//! - Reconnect with exponential backoff (no jitter, optional attempt cap)
//! - Generation-guarded connection state machine
//! - `{topic, payload}` envelope parsing
//! - Topic-family routing to reconciliation actions
//! - WebSocket transport plus a scripted transport for tests

pub mod backoff;
pub mod consumer;
pub mod error;
pub mod message;
pub mod router;
pub mod state;
pub mod transport;

pub use backoff::ReconnectPolicy;
pub use consumer::{StreamConfig, StreamConsumer};
pub use error::{StreamError, StreamResult};
pub use message::StreamEnvelope;
pub use router::{ReconcileAction, Route, TopicRouter, DEFAULT_NAMESPACE};
pub use state::{ConnectionState, ErrorAction, StreamStateMachine};
pub use transport::{
    subscribe_frame, DynPushTransport, OpenRecord, PushConnection, PushTransport,
    ScriptedTransport, TransportEvent, WsTransport,
};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any `wss://` connection is made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
