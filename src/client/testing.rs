//! Mock fetch implementations for testing
//!
//! These mocks let the client and the conversation run without a backend.

use super::{Fetch, FetchError, FetchOptions, FetchResponse};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;

/// A request as seen by the mock
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub body: Value,
    pub options: FetchOptions,
}

/// Mock fetch that returns queued responses in order
pub struct MockFetch {
    responses: Mutex<VecDeque<Result<FetchResponse, FetchError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    /// When set, every request waits for [`MockFetch::release`] before answering
    held: bool,
    release: Notify,
    request_started: Notify,
}

impl MockFetch {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            held: false,
            release: Notify::new(),
            request_started: Notify::new(),
        }
    }

    /// Hold every request until released (for cancellation testing)
    pub fn held(mut self) -> Self {
        self.held = true;
        self
    }

    /// Queue a 200 response with the given JSON body
    pub fn queue_ok(&self, data: Value) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(FetchResponse { status: 200, data }));
    }

    /// Queue a failure
    pub fn queue_err(&self, error: FetchError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn recorded_paths(&self) -> Vec<String> {
        self.recorded_requests()
            .into_iter()
            .map(|r| r.path)
            .collect()
    }

    /// Resolves once a request has reached the mock
    pub async fn wait_for_request(&self) {
        self.request_started.notified().await;
    }

    /// Let one held request answer
    pub fn release(&self) {
        self.release.notify_one();
    }
}

impl Default for MockFetch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetch for MockFetch {
    async fn fetch(
        &self,
        path: &str,
        body: Value,
        options: &FetchOptions,
    ) -> Result<FetchResponse, FetchError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            path: path.to_string(),
            body,
            options: options.clone(),
        });
        self.request_started.notify_one();

        if self.held {
            self.release.notified().await;
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::transport("No mock response queued")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Method;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_fetch_queue() {
        let mock = MockFetch::new();
        mock.queue_ok(json!({ "thread_id": "T1" }));

        let options = FetchOptions::json(Method::Post);
        let response = mock.fetch("threads", json!({}), &options).await.unwrap();
        assert_eq!(response.data, json!({ "thread_id": "T1" }));

        // Nothing left in the queue
        let result = mock.fetch("threads", json!({}), &options).await;
        assert!(result.is_err());
        assert_eq!(mock.recorded_paths(), vec!["threads", "threads"]);
    }

    #[tokio::test]
    async fn test_held_mock_waits_for_release() {
        let mock = std::sync::Arc::new(MockFetch::new().held());
        mock.queue_ok(json!("ok"));

        let task = {
            let mock = mock.clone();
            tokio::spawn(async move {
                mock.fetch("x", Value::Null, &FetchOptions::default()).await
            })
        };

        mock.wait_for_request().await;
        assert!(!task.is_finished());
        mock.release();

        let response = task.await.unwrap().unwrap();
        assert_eq!(response.data, json!("ok"));
    }
}
