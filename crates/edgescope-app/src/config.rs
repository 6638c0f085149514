//! Application configuration.

use std::time::Duration;

use edgescope_core::EntityKind;
use edgescope_dashboard::DashboardConfig;
use edgescope_stream::{ReconnectPolicy, StreamConfig, DEFAULT_NAMESPACE};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Default config path when neither `--config` nor `EDGESCOPE_CONFIG` is set.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Backend REST API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL, without trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout (ms). Applies to every aggregator branch too.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Push stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    #[serde(default = "default_stream_url")]
    pub url: String,
    /// Topic prefixes sent in the subscribe frame.
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,
    /// Leading topic segment routed by this client.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// 0 = retry until disconnected.
    #[serde(default)]
    pub max_reconnect_attempts: u32,
}

fn default_stream_url() -> String {
    "ws://localhost:3000/ws".to_string()
}

fn default_topics() -> Vec<String> {
    [
        "edge", "trade", "strategy", "position", "threat", "kol", "curve", "swarm", "scanner",
    ]
    .iter()
    .map(|family| format!("{DEFAULT_NAMESPACE}.{family}"))
    .collect()
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_reconnect_base_delay_ms() -> u64 {
    2_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            url: default_stream_url(),
            topics: default_topics(),
            namespace: default_namespace(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            max_reconnect_attempts: 0,
        }
    }
}

impl From<&StreamSettings> for StreamConfig {
    fn from(settings: &StreamSettings) -> Self {
        Self {
            url: settings.url.clone(),
            policy: ReconnectPolicy::from_millis(
                settings.reconnect_base_delay_ms,
                settings.reconnect_max_delay_ms,
                settings.max_reconnect_attempts,
            ),
        }
    }
}

/// Collections loaded at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionsConfig {
    #[serde(default = "default_kinds")]
    pub kinds: Vec<EntityKind>,
}

fn default_kinds() -> Vec<EntityKind> {
    EntityKind::ALL.to_vec()
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            kinds: default_kinds(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub collections: CollectionsConfig,
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config path: CLI arg > `EDGESCOPE_CONFIG` > default.
    pub fn resolve_path(cli: Option<String>) -> String {
        cli.or_else(|| std::env::var("EDGESCOPE_CONFIG").ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.api.base_url.is_empty() {
            return Err(AppError::Config("api.base_url must not be empty".to_string()));
        }
        if self.stream.reconnect_base_delay_ms == 0 {
            return Err(AppError::Config(
                "stream.reconnect_base_delay_ms must be positive".to_string(),
            ));
        }
        if self.stream.reconnect_max_delay_ms < self.stream.reconnect_base_delay_ms {
            return Err(AppError::Config(
                "stream.reconnect_max_delay_ms must be >= reconnect_base_delay_ms".to_string(),
            ));
        }
        if self.dashboard.summary_refresh_interval_ms == 0 {
            return Err(AppError::Config(
                "dashboard.summary_refresh_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.api.request_timeout_ms)
    }

    pub fn summary_interval(&self) -> Duration {
        Duration::from_millis(self.dashboard.summary_refresh_interval_ms)
    }
}
