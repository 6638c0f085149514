//! Typed operations over an [`EndpointClient`].
//!
//! Decoding never fails a call: a `data` payload of the wrong shape becomes
//! `data: None`, and a malformed item inside a list is skipped with a warning
//! so one bad record cannot blank a whole collection.

use edgescope_core::{
    ApiEnvelope, Edge, Entity, EntityKind, ExecuteOptions, PnlSummary, Strategy, SwarmHealth,
    ThreatAlert, TradeStats,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::warn;

use crate::endpoint::{paths, DynEndpointClient};
use crate::error::ClientResult;

/// Typed facade over a shared endpoint client.
#[derive(Clone)]
pub struct Api {
    client: DynEndpointClient,
}

impl Api {
    pub fn new(client: DynEndpointClient) -> Self {
        Self { client }
    }

    /// Full authoritative listing of one collection.
    pub async fn list<E: Entity>(&self) -> ClientResult<ApiEnvelope<Vec<E>>> {
        let envelope = self.client.get(paths::collection(E::KIND)).await?;
        Ok(decode_list(E::KIND, envelope))
    }

    /// The `limit` most recent entities of one collection.
    pub async fn recent<E: Entity>(&self, limit: usize) -> ClientResult<ApiEnvelope<Vec<E>>> {
        let path = paths::recent(E::KIND, limit);
        let envelope = self.client.get(&path).await?;
        Ok(decode_list(E::KIND, envelope))
    }

    /// Legacy trade statistics.
    pub async fn trade_stats(&self) -> ClientResult<ApiEnvelope<TradeStats>> {
        let envelope = self.client.get(paths::TRADE_STATS).await?;
        Ok(decode_one("trade_stats", envelope))
    }

    /// Dedicated P&L summary.
    pub async fn pnl_summary(&self) -> ClientResult<ApiEnvelope<PnlSummary>> {
        let envelope = self.client.get(paths::PNL).await?;
        Ok(decode_one("pnl", envelope))
    }

    /// Swarm agent and scanner health.
    pub async fn swarm_health(&self) -> ClientResult<ApiEnvelope<SwarmHealth>> {
        let envelope = self.client.get(paths::SWARM_HEALTH).await?;
        Ok(decode_one("swarm_health", envelope))
    }

    pub async fn approve_edge(&self, id: &str) -> ClientResult<ApiEnvelope<Edge>> {
        let path = paths::action(EntityKind::Edge, id, "approve");
        let envelope = self.client.post(&path, json!({})).await?;
        Ok(decode_one("approve_edge", envelope))
    }

    pub async fn reject_edge(&self, id: &str, reason: &str) -> ClientResult<ApiEnvelope<Edge>> {
        let path = paths::action(EntityKind::Edge, id, "reject");
        let envelope = self.client.post(&path, json!({ "reason": reason })).await?;
        Ok(decode_one("reject_edge", envelope))
    }

    pub async fn execute_edge(
        &self,
        id: &str,
        options: &ExecuteOptions,
    ) -> ClientResult<ApiEnvelope<Edge>> {
        let path = paths::action(EntityKind::Edge, id, "execute");
        let body = serde_json::to_value(options)?;
        let envelope = self.client.post(&path, body).await?;
        Ok(decode_one("execute_edge", envelope))
    }

    /// Activate or pause a strategy.
    pub async fn set_strategy_active(
        &self,
        id: &str,
        active: bool,
    ) -> ClientResult<ApiEnvelope<Strategy>> {
        let action = if active { "activate" } else { "pause" };
        let path = paths::action(EntityKind::Strategy, id, action);
        let envelope = self.client.post(&path, json!({})).await?;
        Ok(decode_one("set_strategy_active", envelope))
    }

    pub async fn acknowledge_alert(&self, id: &str) -> ClientResult<ApiEnvelope<ThreatAlert>> {
        let path = paths::action(EntityKind::ThreatAlert, id, "acknowledge");
        let envelope = self.client.post(&path, json!({})).await?;
        Ok(decode_one("acknowledge_alert", envelope))
    }
}

/// Decode a single-object payload.
pub fn decode_one<T: DeserializeOwned>(context: &str, envelope: ApiEnvelope<Value>) -> ApiEnvelope<T> {
    let ApiEnvelope {
        success,
        data,
        error,
    } = envelope;

    let data = data.and_then(|value| match serde_json::from_value::<T>(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!(context, error = %e, "Response data has unexpected shape, treating as absent");
            None
        }
    });

    ApiEnvelope {
        success,
        data,
        error,
    }
}

/// Decode a list payload item by item.
///
/// Accepts a bare array, or an object wrapping the array under the
/// collection name (`{"edges": [...]}`) or `items`.
pub fn decode_list<T: DeserializeOwned>(
    kind: EntityKind,
    envelope: ApiEnvelope<Value>,
) -> ApiEnvelope<Vec<T>> {
    let ApiEnvelope {
        success,
        data,
        error,
    } = envelope;

    let items = data.and_then(|value| match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => match map
            .remove(kind.as_str())
            .or_else(|| map.remove("items"))
        {
            Some(Value::Array(items)) => Some(items),
            _ => {
                warn!(%kind, "List response has no array payload, treating as absent");
                None
            }
        },
        _ => {
            warn!(%kind, "List response is not an array, treating as absent");
            None
        }
    });

    let data = items.map(|items| {
        let total = items.len();
        let decoded: Vec<T> = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<T>(item) {
                Ok(entity) => Some(entity),
                Err(e) => {
                    warn!(%kind, error = %e, "Skipping malformed entity");
                    None
                }
            })
            .collect();
        if decoded.len() < total {
            warn!(%kind, total, kept = decoded.len(), "Dropped malformed entities from list");
        }
        decoded
    });

    ApiEnvelope {
        success,
        data,
        error,
    }
}
