//! Ordered, ID-unique entity collection.
//!
//! One entity per ID. Where a new entity lands is decided by the
//! collection's [`InsertPolicy`]; an entity whose ID is already present is
//! always replaced at its current position.

use std::collections::HashSet;

use edgescope_core::Entity;
use serde::{Deserialize, Serialize};

/// Where a new ID enters the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertPolicy {
    /// Newest first.
    #[default]
    Prepend,
    /// Oldest first.
    Append,
    /// Only IDs already present are updated; new IDs are ignored.
    ReplaceInPlace,
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New ID added according to the policy.
    Inserted,
    /// Existing ID replaced at its position.
    Replaced,
    /// Authoritative entity took the place of the synthetic entry sharing
    /// its correlation key.
    MergedSynthetic,
    /// New ID dropped by [`InsertPolicy::ReplaceInPlace`].
    Ignored,
}

impl UpsertOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

#[derive(Debug, Clone)]
pub struct Collection<E> {
    items: Vec<E>,
    policy: InsertPolicy,
}

impl<E> Default for Collection<E> {
    fn default() -> Self {
        Self::new(InsertPolicy::default())
    }
}

impl<E> Collection<E> {
    pub fn new(policy: InsertPolicy) -> Self {
        Self {
            items: Vec::new(),
            policy,
        }
    }

    pub fn policy(&self) -> InsertPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: InsertPolicy) {
        self.policy = policy;
    }

    pub fn items(&self) -> &[E] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<E: Entity> Collection<E> {
    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|e| e.id() == id)
    }

    fn position_of_synthetic(&self, key: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|e| e.is_synthetic() && e.correlation_key() == Some(key))
    }

    pub fn get(&self, id: &str) -> Option<&E> {
        self.items.iter().find(|e| e.id() == id)
    }

    /// Any entry, synthetic or not, carrying `key`.
    pub fn find_by_correlation(&self, key: &str) -> Option<&E> {
        self.items
            .iter()
            .find(|e| e.correlation_key() == Some(key))
    }

    fn insert_new(&mut self, entity: E) -> UpsertOutcome {
        match self.policy {
            InsertPolicy::Prepend => {
                self.items.insert(0, entity);
                UpsertOutcome::Inserted
            }
            InsertPolicy::Append => {
                self.items.push(entity);
                UpsertOutcome::Inserted
            }
            InsertPolicy::ReplaceInPlace => UpsertOutcome::Ignored,
        }
    }

    /// Insert or replace one entity.
    pub fn upsert(&mut self, entity: E) -> UpsertOutcome {
        if let Some(idx) = self.position(entity.id()) {
            self.items[idx] = entity;
            return UpsertOutcome::Replaced;
        }

        if !entity.is_synthetic() {
            let synthetic = entity
                .correlation_key()
                .and_then(|key| self.position_of_synthetic(key));
            if let Some(idx) = synthetic {
                self.items[idx] = entity;
                return UpsertOutcome::MergedSynthetic;
            }
        }

        self.insert_new(entity)
    }

    /// Insert a synthetic entity unless its ID or correlation key is
    /// already present. Returns whether it was inserted.
    pub fn insert_synthetic(&mut self, entity: E) -> bool {
        if self.position(entity.id()).is_some() {
            return false;
        }
        if let Some(key) = entity.correlation_key() {
            if self.find_by_correlation(key).is_some() {
                return false;
            }
        }
        self.insert_new(entity) == UpsertOutcome::Inserted
    }

    /// Authoritative replacement. Duplicated IDs keep their first occurrence.
    /// Returns the number of duplicates dropped.
    pub fn replace_all(&mut self, entities: Vec<E>) -> usize {
        let total = entities.len();
        let mut seen: HashSet<String> = HashSet::with_capacity(total);
        let items: Vec<E> = entities
            .into_iter()
            .filter(|entity| seen.insert(entity.id().to_string()))
            .collect();
        let dropped = total - items.len();
        self.items = items;
        dropped
    }

    /// Overwrite the status of `id`, returning the previous one.
    pub fn set_status(&mut self, id: &str, status: E::Status) -> Option<E::Status> {
        let idx = self.position(id)?;
        let previous = self.items[idx].status();
        self.items[idx].set_status(status);
        Some(previous)
    }

    /// Overwrite the status of `id` only if it currently equals `expected`.
    pub fn compare_and_set_status(&mut self, id: &str, expected: E::Status, status: E::Status) -> bool {
        match self.position(id) {
            Some(idx) if self.items[idx].status() == expected => {
                self.items[idx].set_status(status);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use edgescope_core::{Edge, EdgeStatus, Trade, TradeStatus};

    fn edge(id: &str) -> Edge {
        Edge::new(id, EdgeStatus::Detected)
    }

    fn ids<E: Entity>(c: &Collection<E>) -> Vec<&str> {
        c.items().iter().map(|e| e.id()).collect()
    }

    fn real_trade(id: &str, edge_id: &str) -> Trade {
        let mut trade = Trade::new(id, TradeStatus::Open);
        trade.edge_id = Some(edge_id.to_string());
        trade
    }

    #[test]
    fn test_prepend_puts_newest_first() {
        let mut c = Collection::new(InsertPolicy::Prepend);
        c.upsert(edge("E1"));
        c.upsert(edge("E2"));
        assert_eq!(ids(&c), vec!["E2", "E1"]);
    }

    #[test]
    fn test_append_keeps_arrival_order() {
        let mut c = Collection::new(InsertPolicy::Append);
        c.upsert(edge("E1"));
        c.upsert(edge("E2"));
        assert_eq!(ids(&c), vec!["E1", "E2"]);
    }

    #[test]
    fn test_replace_in_place_ignores_new_ids() {
        let mut c = Collection::new(InsertPolicy::ReplaceInPlace);
        c.replace_all(vec![edge("E1")]);

        assert_eq!(c.upsert(edge("E2")), UpsertOutcome::Ignored);
        assert_eq!(
            c.upsert(Edge::new("E1", EdgeStatus::Executed)),
            UpsertOutcome::Replaced
        );
        assert_eq!(ids(&c), vec!["E1"]);
        assert_eq!(c.get("E1").unwrap().status, EdgeStatus::Executed);
    }

    #[test]
    fn test_existing_id_keeps_position() {
        let mut c = Collection::new(InsertPolicy::Prepend);
        c.upsert(edge("E1"));
        c.upsert(edge("E2"));
        c.upsert(edge("E3"));

        let outcome = c.upsert(Edge::new("E2", EdgeStatus::Approved));
        assert_eq!(outcome, UpsertOutcome::Replaced);
        assert_eq!(ids(&c), vec!["E3", "E2", "E1"]);
        assert_eq!(c.get("E2").unwrap().status, EdgeStatus::Approved);
    }

    #[test]
    fn test_replace_all_dedupes_first_wins() {
        let mut c = Collection::default();
        let dropped = c.replace_all(vec![
            edge("E1"),
            Edge::new("E2", EdgeStatus::Approved),
            Edge::new("E2", EdgeStatus::Rejected),
        ]);
        assert_eq!(dropped, 1);
        assert_eq!(ids(&c), vec!["E1", "E2"]);
        assert_eq!(c.get("E2").unwrap().status, EdgeStatus::Approved);
    }

    #[test]
    fn test_replace_all_supersedes_upserts() {
        let mut c = Collection::default();
        c.upsert(edge("X"));
        c.upsert(edge("E1"));

        c.replace_all(vec![edge("E1"), edge("E2")]);
        assert!(c.get("X").is_none());
        assert_eq!(ids(&c), vec!["E1", "E2"]);
    }

    #[test]
    fn test_synthetic_insert_is_idempotent() {
        let mut c = Collection::default();
        let synthetic = Trade::synthetic("E1", None, None, Utc::now()).unwrap();

        assert!(c.insert_synthetic(synthetic.clone()));
        assert!(!c.insert_synthetic(synthetic));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_synthetic_skipped_when_real_trade_exists() {
        let mut c = Collection::default();
        c.upsert(real_trade("T9", "E1"));

        let synthetic = Trade::synthetic("E1", None, None, Utc::now()).unwrap();
        assert!(!c.insert_synthetic(synthetic));
        assert_eq!(ids(&c), vec!["T9"]);
    }

    #[test]
    fn test_authoritative_upsert_merges_synthetic() {
        let mut c = Collection::default();
        c.upsert(real_trade("T1", "E0"));
        c.insert_synthetic(Trade::synthetic("E1", None, None, Utc::now()).unwrap());
        assert_eq!(ids(&c), vec!["synthetic:E1", "T1"]);

        let outcome = c.upsert(real_trade("T9", "E1"));
        assert_eq!(outcome, UpsertOutcome::MergedSynthetic);
        assert_eq!(ids(&c), vec!["T9", "T1"]);
        assert!(!c.get("T9").unwrap().is_synthetic());
    }

    #[test]
    fn test_compare_and_set_status() {
        let mut c = Collection::default();
        c.upsert(Edge::new("E1", EdgeStatus::Executing));

        assert!(!c.compare_and_set_status("E1", EdgeStatus::PendingApproval, EdgeStatus::Failed));
        assert!(c.compare_and_set_status("E1", EdgeStatus::Executing, EdgeStatus::Failed));
        assert_eq!(c.get("E1").unwrap().status, EdgeStatus::Failed);
        assert!(!c.compare_and_set_status("missing", EdgeStatus::Failed, EdgeStatus::Failed));
    }
}
