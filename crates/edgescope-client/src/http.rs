//! HTTP endpoint client.
//!
//! One reqwest call per operation. Response bodies are normalized into the
//! `{success, data, error}` envelope regardless of what the server sent.

use std::time::Duration;

use edgescope_core::ApiEnvelope;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, warn};

use crate::endpoint::{BoxFuture, EndpointClient};
use crate::error::{ClientError, ClientResult};

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// reqwest-backed [`EndpointClient`].
pub struct HttpEndpointClient {
    client: Client,
    base_url: String,
}

impl HttpEndpointClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - API root (e.g., "https://scanner.example.com")
    /// * `timeout` - per-request timeout; a timed-out call is a transport failure
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute(&self, path: &str, request: RequestBuilder) -> ClientResult<ApiEnvelope<Value>> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        let envelope = normalize_body(status.as_u16(), &body);
        if envelope.success {
            debug!(path, status = status.as_u16(), "Endpoint call succeeded");
        } else {
            warn!(
                path,
                status = status.as_u16(),
                error = %envelope.error_message(),
                "Endpoint call unsuccessful"
            );
        }
        Ok(envelope)
    }
}

impl EndpointClient for HttpEndpointClient {
    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, ClientResult<ApiEnvelope<Value>>> {
        Box::pin(async move {
            let request = self.client.get(self.url(path));
            self.execute(path, request).await
        })
    }

    fn post<'a>(
        &'a self,
        path: &'a str,
        body: Value,
    ) -> BoxFuture<'a, ClientResult<ApiEnvelope<Value>>> {
        Box::pin(async move {
            let request = self.client.post(self.url(path)).json(&body);
            self.execute(path, request).await
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout(e.to_string())
    } else {
        ClientError::Request(e.to_string())
    }
}

/// Normalize an HTTP response into an envelope.
///
/// - Body with a `success` key: taken as the envelope (a non-2xx status forces
///   `success:false`).
/// - Any other JSON body: treated as bare `data`, success from the status.
/// - Empty or non-JSON body: `data: None`, success from the status.
pub fn normalize_body(status: u16, body: &[u8]) -> ApiEnvelope<Value> {
    let status_ok = (200..300).contains(&status);
    let status_error = || format!("HTTP {status}");

    let parsed: Option<Value> = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice(body).ok()
    };

    match parsed {
        Some(Value::Object(map)) if map.contains_key("success") => {
            let success = status_ok && map.get("success").and_then(Value::as_bool).unwrap_or(false);
            let data = map.get("data").filter(|v| !v.is_null()).cloned();
            let error = map
                .get("error")
                .and_then(error_text)
                .or_else(|| (!status_ok).then(status_error));
            ApiEnvelope {
                success,
                data,
                error,
            }
        }
        Some(Value::Null) | None if status_ok => ApiEnvelope::ok_empty(),
        Some(value) if status_ok => ApiEnvelope::ok(value),
        Some(value) => ApiEnvelope::failure(
            value
                .get("error")
                .or_else(|| value.get("message"))
                .and_then(error_text)
                .unwrap_or_else(status_error),
        ),
        None => ApiEnvelope::failure(status_error()),
    }
}

fn error_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
