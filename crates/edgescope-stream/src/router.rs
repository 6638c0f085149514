//! Topic-family routing.
//!
//! Topics are dot-namespaced (`<namespace>.<kind>.<action>`) and matched by
//! prefix, so new action suffixes route without code changes. Most families
//! invalidate and refetch their collection. Trade-creation events also
//! insert a synthetic trade right away; the refetch that follows supersedes it.

use chrono::{DateTime, Utc};
use edgescope_core::{EntityKind, Trade};
use tracing::{debug, warn};

use crate::error::{StreamError, StreamResult};
use crate::message::StreamEnvelope;

pub const DEFAULT_NAMESPACE: &str = "domain";

/// Reconciliation work produced by one push message.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileAction {
    /// Refetch a collection in full.
    Refetch(EntityKind),
    /// Insert a placeholder trade until the authoritative one arrives.
    SyntheticTrade(Trade),
    /// Refresh swarm and scanner health.
    RefreshHealth,
}

/// What a topic family maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Refetch(EntityKind),
    /// Synthetic trade, refetch trades, then refetch the listed kind too.
    TradeCreated { also_refetch: Option<EntityKind> },
    RefreshHealth,
}

/// Ordered `(prefix, route)` table. First match wins.
#[derive(Debug, Clone)]
pub struct TopicRouter {
    namespace: String,
    routes: Vec<(String, Route)>,
}

impl Default for TopicRouter {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl TopicRouter {
    pub fn new(namespace: impl Into<String>) -> Self {
        let routes = vec![
            (
                "edge.executed",
                Route::TradeCreated {
                    also_refetch: Some(EntityKind::Edge),
                },
            ),
            ("trade.created", Route::TradeCreated { also_refetch: None }),
            ("trade.opened", Route::TradeCreated { also_refetch: None }),
            ("edge.", Route::Refetch(EntityKind::Edge)),
            ("trade.", Route::Refetch(EntityKind::Trade)),
            ("strategy.", Route::Refetch(EntityKind::Strategy)),
            ("position.", Route::Refetch(EntityKind::Position)),
            ("threat.", Route::Refetch(EntityKind::ThreatAlert)),
            ("kol.", Route::Refetch(EntityKind::Kol)),
            ("curve.", Route::Refetch(EntityKind::CurveToken)),
            ("swarm.", Route::RefreshHealth),
            ("scanner.", Route::RefreshHealth),
        ];

        Self {
            namespace: namespace.into(),
            routes: routes
                .into_iter()
                .map(|(prefix, route)| (prefix.to_string(), route))
                .collect(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Topic with the namespace stripped, or `None` if outside it.
    fn local_topic<'a>(&self, topic: &'a str) -> Option<&'a str> {
        if self.namespace.is_empty() {
            return Some(topic);
        }
        topic
            .strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
    }

    /// Route for a topic, if any family matches.
    pub fn match_topic(&self, topic: &str) -> Option<Route> {
        let local = self.local_topic(topic)?;
        self.routes
            .iter()
            .find(|(prefix, _)| local.starts_with(prefix.as_str()))
            .map(|(_, route)| *route)
    }

    /// Actions for one message. Unknown topics yield no actions.
    ///
    /// A trade-creation message without a usable `edge_id` still refetches;
    /// only the synthetic insert is skipped.
    pub fn route(&self, envelope: &StreamEnvelope) -> Vec<ReconcileAction> {
        self.route_at(envelope, Utc::now())
    }

    pub fn route_at(
        &self,
        envelope: &StreamEnvelope,
        observed_at: DateTime<Utc>,
    ) -> Vec<ReconcileAction> {
        let Some(route) = self.match_topic(&envelope.topic) else {
            debug!(topic = %envelope.topic, "Ignoring unrouted topic");
            return Vec::new();
        };

        match route {
            Route::Refetch(kind) => vec![ReconcileAction::Refetch(kind)],
            Route::RefreshHealth => vec![ReconcileAction::RefreshHealth],
            Route::TradeCreated { also_refetch } => {
                let mut actions = Vec::with_capacity(3);
                match synthetic_trade(envelope, observed_at) {
                    Ok(trade) => actions.push(ReconcileAction::SyntheticTrade(trade)),
                    Err(e) => warn!(
                        topic = %envelope.topic,
                        error = %e,
                        "No synthetic trade for push message, refetching only"
                    ),
                }
                actions.push(ReconcileAction::Refetch(EntityKind::Trade));
                actions.extend(also_refetch.map(ReconcileAction::Refetch));
                actions
            }
        }
    }
}

fn synthetic_trade(envelope: &StreamEnvelope, observed_at: DateTime<Utc>) -> StreamResult<Trade> {
    let edge_id = envelope
        .payload_str("edge_id")
        .or_else(|| envelope.payload_str("edgeId"))
        .ok_or_else(|| StreamError::InvalidEntity(format!("{} without edge_id", envelope.topic)))?;

    let amount = envelope.payload_decimal("amount");
    let market = envelope.payload_str("market").map(str::to_string);

    Trade::synthetic(edge_id, amount, market, observed_at)
        .map_err(|e| StreamError::InvalidEntity(e.to_string()))
}
