//! Prometheus metrics and structured logging for edgescope.
//!
//! - Prometheus metrics for the push stream, store and summary aggregation
//! - Structured JSON logging with tracing
//! - Session statistics report built from the metric registry

pub mod error;
pub mod logging;
pub mod metrics;
pub mod report;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use report::SessionStats;
