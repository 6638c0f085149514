//! Optimistic mutation controller.
//!
//! A user action on an entity shows up in the store immediately as a
//! transient status, before the confirming request resolves:
//!
//! 1. the transient status is written synchronously,
//! 2. the request is awaited,
//! 3. a successful response carrying the entity replaces it (server wins),
//! 4. a successful response without the entity leaves the transient status,
//! 5. a transport error or `success:false` moves the entity to its failure
//!    status, but only if it still holds the transient status written in
//!    step 1. A newer authoritative write in between is left alone.
//!
//! Failed mutations are never retried here. Retrying is a new user action.

use std::future::Future;

use edgescope_client::ClientResult;
use edgescope_core::ApiEnvelope;
use edgescope_telemetry::Metrics;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::store::{EntityStore, StoredEntity};

/// Result of one optimistic mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Server returned the entity; it replaced the optimistic one.
    Confirmed,
    /// Server accepted without returning the entity; transient status kept.
    Accepted,
    /// Request failed; entity moved to its failure status.
    RolledBack { reason: String },
    /// Request failed, but the entity had already been overwritten by a
    /// newer write (or removed), so it was left untouched.
    Superseded { reason: String },
}

impl MutationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Accepted)
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::RolledBack { reason } | Self::Superseded { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Applies provisional transitions to the store and reconciles them.
#[derive(Clone)]
pub struct OptimisticController {
    store: EntityStore,
}

impl OptimisticController {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    /// Write `transient` to entity `id` now. Returns false if the entity is
    /// not in the store.
    pub fn apply<E: StoredEntity>(&self, id: &str, transient: E::Status) -> bool {
        self.store.set_status::<E>(id, transient).is_ok()
    }

    /// Run one optimistic mutation end to end.
    ///
    /// `request` is not polled until after the transient status is written.
    pub async fn run<E, F>(&self, id: &str, transient: E::Status, request: F) -> MutationOutcome
    where
        E: StoredEntity,
        F: Future<Output = ClientResult<ApiEnvelope<E>>>,
    {
        let ticket = Uuid::new_v4();
        let present = self.apply::<E>(id, transient);
        debug!(
            %ticket,
            kind = %E::KIND,
            id,
            ?transient,
            present,
            "Optimistic transition applied"
        );

        let reason = match request.await {
            Ok(envelope) if envelope.success => {
                return match envelope.data {
                    Some(entity) => {
                        if entity.id() != id {
                            warn!(
                                %ticket,
                                kind = %E::KIND,
                                id,
                                returned_id = entity.id(),
                                "Action response returned a different entity"
                            );
                        }
                        self.store.upsert(entity);
                        debug!(%ticket, kind = %E::KIND, id, "Mutation confirmed");
                        MutationOutcome::Confirmed
                    }
                    None => {
                        debug!(%ticket, kind = %E::KIND, id, "Mutation accepted without entity");
                        MutationOutcome::Accepted
                    }
                };
            }
            Ok(envelope) => envelope.error_message(),
            Err(e) => e.to_string(),
        };

        if self
            .store
            .compare_and_set_status::<E>(id, transient, E::failure_status())
        {
            Metrics::optimistic_rollback(E::KIND);
            warn!(
                %ticket,
                kind = %E::KIND,
                id,
                reason = %reason,
                "Mutation failed, rolled back to failure status"
            );
            MutationOutcome::RolledBack { reason }
        } else {
            warn!(
                %ticket,
                kind = %E::KIND,
                id,
                reason = %reason,
                "Mutation failed after entity was superseded"
            );
            MutationOutcome::Superseded { reason }
        }
    }
}
