//! Stream error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Missing topic")]
    MissingTopic,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid entity: {0}")]
    InvalidEntity(String),
}

impl StreamError {
    /// Metric label for a dropped message.
    pub fn drop_reason(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "invalid_json",
            Self::InvalidEnvelope(_) => "invalid_envelope",
            Self::MissingTopic => "missing_topic",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::InvalidEntity(_) => "invalid_entity",
        }
    }
}

pub type StreamResult<T> = Result<T, StreamError>;
