//! Response envelope shared by every endpoint call.

use serde::{Deserialize, Serialize};

/// `{success, data, error}` envelope.
///
/// `data` is `None` both when the server omitted it and when the body could
/// not be decoded into the expected shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default = "none")]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

fn none<T>() -> Option<T> {
    None
}

impl<T> ApiEnvelope<T> {
    /// Successful response carrying data.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Successful response without data.
    pub fn ok_empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    /// Failed response.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Data of a successful response.
    pub fn into_data(self) -> Option<T> {
        if self.success {
            self.data
        } else {
            None
        }
    }

    pub fn map_data<U>(self, f: impl FnOnce(T) -> U) -> ApiEnvelope<U> {
        ApiEnvelope {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
        }
    }

    /// Error message, falling back to a generic one for bare `success:false`.
    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "request unsuccessful".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default() {
        let env: ApiEnvelope<u32> = serde_json::from_str("{}").unwrap();
        assert!(!env.success);
        assert!(env.data.is_none());
        assert_eq!(env.error_message(), "request unsuccessful");
    }

    #[test]
    fn test_failed_envelope_hides_data() {
        let env = ApiEnvelope {
            success: false,
            data: Some(7u32),
            error: Some("boom".to_string()),
        };
        assert_eq!(env.clone().into_data(), None);
        assert_eq!(env.error_message(), "boom");
    }

    #[test]
    fn test_map_data_keeps_flags() {
        let env = ApiEnvelope::ok(2u32).map_data(|v| v * 10);
        assert!(env.is_success());
        assert_eq!(env.into_data(), Some(20));
    }
}
