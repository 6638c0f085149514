//! Entity store for the edgescope dashboard client.
//!
//! - `Collection`: ordered, ID-unique list with an explicit `InsertPolicy`
//! - `EntityStore`: shared store of every collection, revision-notified
//! - `OptimisticController`: provisional status transitions with rollback

pub mod collection;
pub mod error;
pub mod optimistic;
pub mod store;

pub use collection::{Collection, InsertPolicy, UpsertOutcome};
pub use error::{StoreError, StoreResult};
pub use optimistic::{MutationOutcome, OptimisticController};
pub use store::{Collections, EntityStore, StoreSnapshot, StoredEntity};
