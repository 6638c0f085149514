//! Push message envelope.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{StreamError, StreamResult};

/// `{topic, payload}` push message.
///
/// A missing or null payload is treated as empty; a payload of any other
/// non-object type is rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamEnvelope {
    pub topic: String,
    pub payload: Map<String, Value>,
}

impl StreamEnvelope {
    pub fn new(topic: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    /// Parse one text frame.
    pub fn parse(text: &str) -> StreamResult<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| StreamError::InvalidJson(e.to_string()))?;

        let Value::Object(mut object) = value else {
            return Err(StreamError::InvalidEnvelope(
                "message is not a JSON object".to_string(),
            ));
        };

        let topic = match object.remove("topic") {
            Some(Value::String(topic)) if !topic.trim().is_empty() => topic,
            _ => return Err(StreamError::MissingTopic),
        };

        let payload = match object.remove("payload") {
            Some(Value::Object(payload)) => payload,
            None | Some(Value::Null) => Map::new(),
            Some(other) => {
                return Err(StreamError::InvalidPayload(format!(
                    "expected object, got {}",
                    json_type(&other)
                )))
            }
        };

        Ok(Self { topic, payload })
    }

    /// Non-empty string field of the payload.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Decimal field of the payload, from a JSON number or numeric string.
    pub fn payload_decimal(&self, key: &str) -> Option<Decimal> {
        match self.payload.get(key)? {
            Value::Number(n) => {
                let text = n.to_string();
                text.parse()
                    .ok()
                    .or_else(|| Decimal::from_scientific(&text).ok())
            }
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
