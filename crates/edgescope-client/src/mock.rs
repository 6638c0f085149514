//! Scripted endpoint client for tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use edgescope_core::ApiEnvelope;
use serde_json::Value;

use crate::endpoint::{BoxFuture, EndpointClient};
use crate::error::{ClientError, ClientResult};

/// Canned answer for one path.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Server produced a response.
    Envelope(ApiEnvelope<Value>),
    /// Request never completed.
    TransportError(String),
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

/// Mock endpoint client for testing.
///
/// Paths match exactly, query string included. One-shot responses queued
/// with [`push_response`](Self::push_response) are consumed first, then the
/// sticky response set with [`set_response`](Self::set_response) applies.
#[derive(Debug, Default)]
pub struct MockEndpointClient {
    /// Sticky responses.
    responses: parking_lot::Mutex<HashMap<String, MockResponse>>,
    /// One-shot responses, consumed in order.
    queued: parking_lot::Mutex<HashMap<String, VecDeque<MockResponse>>>,
    /// Artificial latency per path.
    delays: parking_lot::Mutex<HashMap<String, Duration>>,
    /// Recorded calls for verification.
    calls: parking_lot::Mutex<Vec<MockCall>>,
}

impl MockEndpointClient {
    /// Create a new mock client with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call to `path` with `envelope`.
    pub fn set_response(&self, path: &str, envelope: ApiEnvelope<Value>) {
        self.responses
            .lock()
            .insert(path.to_string(), MockResponse::Envelope(envelope));
    }

    /// Answer the next call to `path` with `response`.
    pub fn push_response(&self, path: &str, response: MockResponse) {
        self.queued
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(response);
    }

    /// Fail every call to `path` at the transport level.
    pub fn set_transport_error(&self, path: &str, message: &str) {
        self.responses.lock().insert(
            path.to_string(),
            MockResponse::TransportError(message.to_string()),
        );
    }

    /// Delay every call to `path`.
    pub fn set_delay(&self, path: &str, delay: Duration) {
        self.delays.lock().insert(path.to_string(), delay);
    }

    /// All recorded calls, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, path: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.path == path).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    async fn respond(
        &self,
        method: &'static str,
        path: &str,
        body: Option<Value>,
    ) -> ClientResult<ApiEnvelope<Value>> {
        self.calls.lock().push(MockCall {
            method,
            path: path.to_string(),
            body,
        });

        let delay = self.delays.lock().get(path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self
            .queued
            .lock()
            .get_mut(path)
            .and_then(VecDeque::pop_front);
        let response = queued.or_else(|| self.responses.lock().get(path).cloned());

        match response {
            Some(MockResponse::Envelope(envelope)) => Ok(envelope),
            Some(MockResponse::TransportError(message)) => Err(ClientError::Request(message)),
            None => Err(ClientError::Request(format!(
                "no mock response for {method} {path}"
            ))),
        }
    }
}

impl EndpointClient for MockEndpointClient {
    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, ClientResult<ApiEnvelope<Value>>> {
        Box::pin(self.respond("GET", path, None))
    }

    fn post<'a>(
        &'a self,
        path: &'a str,
        body: Value,
    ) -> BoxFuture<'a, ClientResult<ApiEnvelope<Value>>> {
        Box::pin(self.respond("POST", path, Some(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_queued_response_takes_precedence() {
        let mock = MockEndpointClient::new();
        mock.set_response("/api/pnl", ApiEnvelope::ok(json!({"total_pnl": "1"})));
        mock.push_response("/api/pnl", MockResponse::Envelope(ApiEnvelope::failure("first")));

        let first = mock.get("/api/pnl").await.unwrap();
        assert!(!first.success);
        let second = mock.get("/api/pnl").await.unwrap();
        assert!(second.success);
        assert_eq!(mock.call_count("/api/pnl"), 2);
    }

    #[tokio::test]
    async fn test_unscripted_path_is_transport_error() {
        let mock = MockEndpointClient::new();
        let err = mock.get("/api/unknown").await.unwrap_err();
        assert!(err.to_string().contains("/api/unknown"));
    }

    #[tokio::test]
    async fn test_post_records_body() {
        let mock = MockEndpointClient::new();
        mock.set_response("/api/edges/E1/reject", ApiEnvelope::ok_empty());

        mock.post("/api/edges/E1/reject", json!({"reason": "stale"}))
            .await
            .unwrap();

        let calls = mock.calls();
        assert_eq!(calls[0].method, "POST");
        assert_eq!(calls[0].body, Some(json!({"reason": "stale"})));
    }
}
