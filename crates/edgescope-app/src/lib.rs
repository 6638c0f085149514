//! edgescope - dashboard client for the edgescope trading backend.
//!
//! Wires the dashboard session to the real transports:
//! - REST endpoint client (reqwest)
//! - WebSocket push stream (tokio-tungstenite)
//! - Periodic composite summary refresh
//! - Session statistics on shutdown

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
