//! edgescope-dashboard - Live reconciliation for the edgescope dashboard client.
//!
//! Ties the store, the endpoint client and the push stream into one session:
//!
//! ```text
//!   user action ──► OptimisticController ──► EntityStore ◄── CollectionLoader
//!                          │                     ▲                  ▲
//!                          ▼                     │                  │
//!                     Endpoint API          Reconciler ─────────────┘
//!                          │                     ▲
//!                          ▼                     │ ReconcileAction
//!                   FetchAggregator        StreamConsumer ◄── push transport
//!                          │
//!                          ▼
//!                  CompositeSummary ──► DashboardView ◄── store snapshot
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use edgescope_dashboard::{DashboardConfig, DashboardSession};
//!
//! let session = DashboardSession::new(&config, client, stream_config, transport, router);
//! session.refresh_all(&EntityKind::ALL).await;
//! session.connect(topics).await;
//! let view = session.view();
//! ```

pub mod aggregator;
pub mod config;
pub mod error;
pub mod loader;
pub mod reconcile;
pub mod session;
pub mod summary;
pub mod view;

pub use aggregator::{FetchAggregator, RecentLimits, SummaryCache};
pub use config::DashboardConfig;
pub use error::{DashboardError, DashboardResult};
pub use loader::CollectionLoader;
pub use reconcile::{ReconcilePlan, Reconciler};
pub use session::DashboardSession;
pub use summary::{
    BranchResult, CompositeSummary, FailedBranch, FieldChain, SummaryBranches, SummarySource,
};
pub use view::{DashboardView, ViewCounts};
