//! Authoritative collection loads.
//!
//! A successful list fetch replaces the whole collection in the store. A
//! failed one (transport error, `success:false`, or no data) keeps the
//! previous collection and records a visible load error for that kind
//! until the next successful load.

use std::collections::BTreeMap;
use std::sync::Arc;

use edgescope_client::Api;
use edgescope_core::{CurveToken, Edge, EntityKind, Kol, Position, Strategy, ThreatAlert, Trade};
use edgescope_store::{EntityStore, StoredEntity};
use edgescope_telemetry::Metrics;
use parking_lot::RwLock;
use tracing::{debug, error};

use crate::error::{DashboardError, DashboardResult};

#[derive(Clone)]
pub struct CollectionLoader {
    api: Api,
    store: EntityStore,
    load_errors: Arc<RwLock<BTreeMap<EntityKind, String>>>,
}

impl CollectionLoader {
    pub fn new(api: Api, store: EntityStore) -> Self {
        Self {
            api,
            store,
            load_errors: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Fetch one collection and replace it. Returns the new length.
    pub async fn refresh<E: StoredEntity>(&self) -> DashboardResult<usize> {
        let fetched = match self.api.list::<E>().await {
            Ok(envelope) if envelope.success => match envelope.data {
                Some(entities) => Ok(entities),
                None => Err("response carried no list".to_string()),
            },
            Ok(envelope) => Err(envelope.error_message()),
            Err(e) => Err(e.to_string()),
        };

        match fetched {
            Ok(entities) => {
                let len = self.store.replace_collection(entities);
                self.load_errors.write().remove(&E::KIND);
                Metrics::collection_refresh(E::KIND, true);
                debug!(kind = %E::KIND, len, "Collection refreshed");
                Ok(len)
            }
            Err(reason) => {
                Metrics::collection_refresh(E::KIND, false);
                error!(
                    kind = %E::KIND,
                    reason = %reason,
                    "Collection load failed, keeping previous data"
                );
                self.load_errors.write().insert(E::KIND, reason.clone());
                Err(DashboardError::LoadFailed {
                    kind: E::KIND,
                    reason,
                })
            }
        }
    }

    /// [`refresh`](Self::refresh) by runtime kind.
    pub async fn refresh_kind(&self, kind: EntityKind) -> DashboardResult<usize> {
        match kind {
            EntityKind::Edge => self.refresh::<Edge>().await,
            EntityKind::Trade => self.refresh::<Trade>().await,
            EntityKind::Strategy => self.refresh::<Strategy>().await,
            EntityKind::Position => self.refresh::<Position>().await,
            EntityKind::ThreatAlert => self.refresh::<ThreatAlert>().await,
            EntityKind::Kol => self.refresh::<Kol>().await,
            EntityKind::CurveToken => self.refresh::<CurveToken>().await,
        }
    }

    /// Current load errors by kind.
    pub fn load_errors(&self) -> BTreeMap<EntityKind, String> {
        self.load_errors.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgescope_client::MockEndpointClient;
    use edgescope_core::{ApiEnvelope, EdgeStatus};
    use serde_json::json;

    fn setup() -> (Arc<MockEndpointClient>, EntityStore, CollectionLoader) {
        let mock = Arc::new(MockEndpointClient::new());
        let store = EntityStore::new();
        let loader = CollectionLoader::new(Api::new(mock.clone()), store.clone());
        (mock, store, loader)
    }

    #[tokio::test]
    async fn test_refresh_replaces_collection() {
        let (mock, store, loader) = setup();
        store.upsert(Edge::new("OLD", EdgeStatus::Executing));
        mock.set_response(
            "/api/edges",
            ApiEnvelope::ok(json!([{"id": "E1"}, {"id": "E2"}])),
        );

        assert_eq!(loader.refresh::<Edge>().await.unwrap(), 2);
        let ids: Vec<String> = store.get::<Edge>().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["E1", "E2"]);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_and_records_error() {
        let (mock, store, loader) = setup();
        store.upsert(Edge::new("E1", EdgeStatus::Detected));
        mock.set_response("/api/edges", ApiEnvelope::failure("database unavailable"));

        let err = loader.refresh::<Edge>().await.unwrap_err();
        assert!(matches!(err, DashboardError::LoadFailed { kind: EntityKind::Edge, .. }));
        assert_eq!(store.len::<Edge>(), 1);
        assert_eq!(
            loader.load_errors().get(&EntityKind::Edge).map(String::as_str),
            Some("database unavailable")
        );

        mock.set_response("/api/edges", ApiEnvelope::ok(json!([])));
        loader.refresh::<Edge>().await.unwrap();
        assert!(loader.load_errors().is_empty());
        assert_eq!(store.len::<Edge>(), 0);
    }

    #[tokio::test]
    async fn test_success_without_data_is_a_load_failure() {
        let (mock, _store, loader) = setup();
        mock.set_response("/api/kols", ApiEnvelope::ok_empty());

        assert!(loader.refresh_kind(EntityKind::Kol).await.is_err());
        assert!(loader.load_errors().contains_key(&EntityKind::Kol));
    }
}
