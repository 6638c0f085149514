//! Shared in-memory entity store.
//!
//! Every writer (authoritative refresh, optimistic controller, stream
//! reconciliation) goes through this type, so the ordering and supersession
//! rules live in one place. The store is explicitly constructed and cheaply
//! cloneable; clones share the same collections.
//!
//! After every mutation that changes a collection the store bumps a
//! revision counter published on a `watch` channel, which is how readers
//! learn that the view must be recomputed.

use std::sync::Arc;

use edgescope_core::{CurveToken, Edge, Entity, EntityKind, Kol, Position, Strategy, ThreatAlert, Trade};
use edgescope_telemetry::Metrics;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::collection::{Collection, InsertPolicy, UpsertOutcome};
use crate::error::{StoreError, StoreResult};

/// Collections of every kind.
#[derive(Debug, Default)]
pub struct Collections {
    edges: Collection<Edge>,
    trades: Collection<Trade>,
    strategies: Collection<Strategy>,
    positions: Collection<Position>,
    threat_alerts: Collection<ThreatAlert>,
    kols: Collection<Kol>,
    curve_tokens: Collection<CurveToken>,
}

impl Collections {
    fn set_policy(&mut self, kind: EntityKind, policy: InsertPolicy) {
        match kind {
            EntityKind::Edge => self.edges.set_policy(policy),
            EntityKind::Trade => self.trades.set_policy(policy),
            EntityKind::Strategy => self.strategies.set_policy(policy),
            EntityKind::Position => self.positions.set_policy(policy),
            EntityKind::ThreatAlert => self.threat_alerts.set_policy(policy),
            EntityKind::Kol => self.kols.set_policy(policy),
            EntityKind::CurveToken => self.curve_tokens.set_policy(policy),
        }
    }

    fn policy(&self, kind: EntityKind) -> InsertPolicy {
        match kind {
            EntityKind::Edge => self.edges.policy(),
            EntityKind::Trade => self.trades.policy(),
            EntityKind::Strategy => self.strategies.policy(),
            EntityKind::Position => self.positions.policy(),
            EntityKind::ThreatAlert => self.threat_alerts.policy(),
            EntityKind::Kol => self.kols.policy(),
            EntityKind::CurveToken => self.curve_tokens.policy(),
        }
    }
}

/// Entity kinds with a collection in the store.
pub trait StoredEntity: Entity {
    fn collection(collections: &Collections) -> &Collection<Self>;
    fn collection_mut(collections: &mut Collections) -> &mut Collection<Self>;
}

macro_rules! stored_entity {
    ($ty:ty, $field:ident) => {
        impl StoredEntity for $ty {
            fn collection(collections: &Collections) -> &Collection<Self> {
                &collections.$field
            }

            fn collection_mut(collections: &mut Collections) -> &mut Collection<Self> {
                &mut collections.$field
            }
        }
    };
}

stored_entity!(Edge, edges);
stored_entity!(Trade, trades);
stored_entity!(Strategy, strategies);
stored_entity!(Position, positions);
stored_entity!(ThreatAlert, threat_alerts);
stored_entity!(Kol, kols);
stored_entity!(CurveToken, curve_tokens);

/// Point-in-time copy of every collection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreSnapshot {
    pub revision: u64,
    pub edges: Vec<Edge>,
    pub trades: Vec<Trade>,
    pub strategies: Vec<Strategy>,
    pub positions: Vec<Position>,
    pub threat_alerts: Vec<ThreatAlert>,
    pub kols: Vec<Kol>,
    pub curve_tokens: Vec<CurveToken>,
}

impl StoreSnapshot {
    /// Entity count of one kind.
    pub fn len(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Edge => self.edges.len(),
            EntityKind::Trade => self.trades.len(),
            EntityKind::Strategy => self.strategies.len(),
            EntityKind::Position => self.positions.len(),
            EntityKind::ThreatAlert => self.threat_alerts.len(),
            EntityKind::Kol => self.kols.len(),
            EntityKind::CurveToken => self.curve_tokens.len(),
        }
    }
}

/// Shared entity store.
#[derive(Clone)]
pub struct EntityStore {
    collections: Arc<RwLock<Collections>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    /// Create an empty store with the default insert policy for every kind.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            collections: Arc::new(RwLock::new(Collections::default())),
            revision: Arc::new(tx),
        }
    }

    /// Create an empty store with per-kind insert policies.
    pub fn with_policies(policies: impl IntoIterator<Item = (EntityKind, InsertPolicy)>) -> Self {
        let store = Self::new();
        {
            let mut collections = store.collections.write();
            for (kind, policy) in policies {
                collections.set_policy(kind, policy);
            }
        }
        store
    }

    pub fn set_policy(&self, kind: EntityKind, policy: InsertPolicy) {
        self.collections.write().set_policy(kind, policy);
    }

    pub fn policy(&self, kind: EntityKind) -> InsertPolicy {
        self.collections.read().policy(kind)
    }

    /// Current revision.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Receiver notified after every change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    /// Insert or replace one entity by ID.
    pub fn upsert<E: StoredEntity>(&self, entity: E) -> UpsertOutcome {
        let (outcome, len) = {
            let mut collections = self.collections.write();
            let collection = E::collection_mut(&mut collections);
            let outcome = collection.upsert(entity);
            (outcome, collection.len())
        };

        trace!(kind = %E::KIND, ?outcome, "Upsert");
        if outcome.changed() {
            Metrics::collection_size(E::KIND, len);
            self.bump();
        }
        outcome
    }

    /// Authoritative replacement of a whole collection.
    ///
    /// Anything not in `entities` is gone afterwards, including synthetic and
    /// optimistic entries. Returns the resulting length.
    pub fn replace_collection<E: StoredEntity>(&self, entities: Vec<E>) -> usize {
        let (dropped, len) = {
            let mut collections = self.collections.write();
            let collection = E::collection_mut(&mut collections);
            let dropped = collection.replace_all(entities);
            (dropped, collection.len())
        };

        if dropped > 0 {
            debug!(kind = %E::KIND, dropped, "Dropped duplicate IDs from authoritative list");
        }
        debug!(kind = %E::KIND, len, "Collection replaced");
        Metrics::collection_size(E::KIND, len);
        self.bump();
        len
    }

    /// Insert a synthetic entity unless its correlation key is already
    /// represented. Returns whether it was inserted.
    pub fn insert_synthetic<E: StoredEntity>(&self, entity: E) -> StoreResult<bool> {
        if !entity.is_synthetic() || entity.correlation_key().is_none() {
            return Err(StoreError::InvalidEntity(format!(
                "{}/{} is not a correlated synthetic entity",
                E::KIND,
                entity.id()
            )));
        }

        let (inserted, len) = {
            let mut collections = self.collections.write();
            let collection = E::collection_mut(&mut collections);
            let inserted = collection.insert_synthetic(entity);
            (inserted, collection.len())
        };

        if inserted {
            Metrics::collection_size(E::KIND, len);
            self.bump();
        }
        Ok(inserted)
    }

    /// Current collection, in order.
    pub fn get<E: StoredEntity>(&self) -> Vec<E> {
        E::collection(&self.collections.read()).items().to_vec()
    }

    pub fn find<E: StoredEntity>(&self, id: &str) -> Option<E> {
        E::collection(&self.collections.read()).get(id).cloned()
    }

    pub fn len<E: StoredEntity>(&self) -> usize {
        E::collection(&self.collections.read()).len()
    }

    /// Overwrite the status of one entity, returning the previous status.
    pub fn set_status<E: StoredEntity>(&self, id: &str, status: E::Status) -> StoreResult<E::Status> {
        let previous = E::collection_mut(&mut self.collections.write()).set_status(id, status);
        match previous {
            Some(previous) => {
                if previous != status {
                    self.bump();
                }
                Ok(previous)
            }
            None => Err(StoreError::NotFound {
                kind: E::KIND,
                id: id.to_string(),
            }),
        }
    }

    /// Overwrite the status only if it still equals `expected`.
    pub fn compare_and_set_status<E: StoredEntity>(
        &self,
        id: &str,
        expected: E::Status,
        status: E::Status,
    ) -> bool {
        let swapped = E::collection_mut(&mut self.collections.write())
            .compare_and_set_status(id, expected, status);
        if swapped {
            self.bump();
        }
        swapped
    }

    /// Copy every collection under one read lock.
    pub fn snapshot(&self) -> StoreSnapshot {
        let collections = self.collections.read();
        StoreSnapshot {
            revision: self.revision(),
            edges: collections.edges.items().to_vec(),
            trades: collections.trades.items().to_vec(),
            strategies: collections.strategies.items().to_vec(),
            positions: collections.positions.items().to_vec(),
            threat_alerts: collections.threat_alerts.items().to_vec(),
            kols: collections.kols.items().to_vec(),
            curve_tokens: collections.curve_tokens.items().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use edgescope_core::{EdgeStatus, TradeStatus};

    fn trade_for(id: &str, edge_id: &str) -> Trade {
        let mut trade = Trade::new(id, TradeStatus::Open);
        trade.edge_id = Some(edge_id.to_string());
        trade
    }

    #[test]
    fn test_replace_supersedes_previous_upserts() {
        let store = EntityStore::new();
        store.upsert(Edge::new("x", EdgeStatus::PendingApproval));
        store.upsert(Edge::new("y", EdgeStatus::Detected));

        store.replace_collection(vec![Edge::new("y", EdgeStatus::Approved)]);

        let edges = store.get::<Edge>();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].id, "y");
        assert!(store.find::<Edge>("x").is_none());
    }

    #[test]
    fn test_refresh_leaves_one_trade_per_edge() {
        let store = EntityStore::new();
        let synthetic = Trade::synthetic("E", None, None, Utc::now()).unwrap();
        assert!(store.insert_synthetic(synthetic).unwrap());

        store.replace_collection(vec![trade_for("T1", "E"), trade_for("T2", "F")]);

        let trades = store.get::<Trade>();
        let for_e: Vec<_> = trades
            .iter()
            .filter(|t| t.edge_id.as_deref() == Some("E"))
            .collect();
        assert_eq!(for_e.len(), 1);
        assert_eq!(for_e[0].id, "T1");
    }

    #[test]
    fn test_insert_synthetic_rejects_authoritative_entity() {
        let store = EntityStore::new();
        assert!(store.insert_synthetic(trade_for("T1", "E")).is_err());
    }

    #[test]
    fn test_clones_share_state_and_revision() {
        let store = EntityStore::new();
        let other = store.clone();
        let rx = other.subscribe();

        store.upsert(Edge::new("E1", EdgeStatus::Detected));

        assert_eq!(other.len::<Edge>(), 1);
        assert_eq!(*rx.borrow(), 1);
        assert_eq!(other.revision(), 1);
    }

    #[test]
    fn test_ignored_upsert_does_not_bump_revision() {
        let store = EntityStore::with_policies([(EntityKind::Edge, InsertPolicy::ReplaceInPlace)]);
        assert_eq!(store.policy(EntityKind::Edge), InsertPolicy::ReplaceInPlace);

        store.upsert(Edge::new("E1", EdgeStatus::Detected));
        assert_eq!(store.revision(), 0);
        assert_eq!(store.len::<Edge>(), 0);
    }

    #[test]
    fn test_set_status_missing_entity() {
        let store = EntityStore::new();
        let err = store
            .set_status::<Edge>("nope", EdgeStatus::Executing)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: EntityKind::Edge, .. }));
    }

    #[test]
    fn test_snapshot_is_independent_copy() {
        let store = EntityStore::new();
        store.upsert(Edge::new("E1", EdgeStatus::Detected));
        let snapshot = store.snapshot();

        store.upsert(Edge::new("E2", EdgeStatus::Detected));

        assert_eq!(snapshot.len(EntityKind::Edge), 1);
        assert_eq!(snapshot.revision, 1);
        assert_eq!(store.len::<Edge>(), 2);
    }
}
