//! Endpoint client trait.
//!
//! Abstracts the HTTP transport so the aggregator, optimistic controller and
//! session can be driven by the real client or by a scripted mock.

use std::pin::Pin;
use std::sync::Arc;

use edgescope_core::ApiEnvelope;
use serde_json::Value;

use crate::error::ClientResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// One call per logical operation, answered with a normalized envelope.
///
/// `Err` means the request never produced a response (connect failure,
/// timeout). Any response the server did produce, including non-2xx and
/// unparsable bodies, comes back as `Ok` with `success` set accordingly.
pub trait EndpointClient: Send + Sync {
    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, ClientResult<ApiEnvelope<Value>>>;

    fn post<'a>(
        &'a self,
        path: &'a str,
        body: Value,
    ) -> BoxFuture<'a, ClientResult<ApiEnvelope<Value>>>;
}

/// Arc wrapper for EndpointClient trait objects.
pub type DynEndpointClient = Arc<dyn EndpointClient>;

/// Endpoint paths, relative to the API base URL.
pub mod paths {
    use edgescope_core::EntityKind;

    pub const TRADE_STATS: &str = "/api/trades/stats";
    pub const PNL: &str = "/api/pnl";
    pub const SWARM_HEALTH: &str = "/api/swarm/health";

    /// Full collection listing for a kind.
    pub fn collection(kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::Edge => "/api/edges",
            EntityKind::Trade => "/api/trades",
            EntityKind::Strategy => "/api/strategies",
            EntityKind::Position => "/api/positions",
            EntityKind::ThreatAlert => "/api/threats/alerts",
            EntityKind::Kol => "/api/kols",
            EntityKind::CurveToken => "/api/curve/tokens",
        }
    }

    /// Most recent `limit` entities of a kind.
    pub fn recent(kind: EntityKind, limit: usize) -> String {
        format!("{}?limit={limit}", collection(kind))
    }

    /// Action on a single entity, e.g. `/api/edges/E1/approve`.
    ///
    /// The ID is percent-encoded as one path segment.
    pub fn action(kind: EntityKind, id: &str, action: &str) -> String {
        format!("{}/{}/{action}", collection(kind), encode_segment(id))
    }

    /// Percent-encode one path segment (`/`, `?`, `#`, `%` and spaces included).
    pub fn encode_segment(segment: &str) -> String {
        // byte_serialize writes spaces as '+' and a literal '+' as %2B.
        url::form_urlencoded::byte_serialize(segment.as_bytes())
            .collect::<String>()
            .replace('+', "%20")
    }
}
