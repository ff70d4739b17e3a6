//! Assistant API client
//!
//! Performs the two remote operations the assistant exposes (create a thread,
//! post a message into it) over an injected [`Fetch`] capability and
//! normalizes every failure into [`AssistantError`].

mod error;
mod fetch;
mod http;
mod types;

#[cfg(test)]
pub mod testing;

pub use error::{AssistantError, CONVERSATION_UNAVAILABLE};
pub use fetch::{
    Fetch, FetchError, FetchOptions, FetchResponse, LoggingFetch, Method, ResponseType,
};
pub use http::{HttpFetch, HttpFetchError};
pub use types::{Message, Role, Thread};

use error::THREAD_NOT_FOUND_DETAIL;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Client for the assistant backend
#[derive(Clone)]
pub struct AssistantClient {
    fetch: Arc<dyn Fetch>,
    headers: Vec<(String, String)>,
}

impl AssistantClient {
    pub fn new(fetch: Arc<dyn Fetch>) -> Self {
        Self {
            fetch,
            headers: Vec::new(),
        }
    }

    /// Extra headers sent with every request
    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Create a thread seeded with the editor's current query
    pub async fn create_thread(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Thread, AssistantError> {
        let body = json!({ "query": query });
        with_abort(self.post("threads", body), cancel).await
    }

    /// Post a user message into an existing thread and return the reply
    pub async fn send_message(
        &self,
        thread_id: &str,
        message: &str,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Message, AssistantError> {
        let path = format!("threads/{thread_id}/messages");
        let body = json!({
            "thread_id": thread_id,
            "message": message,
            "query": query,
        });

        match with_abort(self.post(&path, body), cancel).await {
            Err(AssistantError::Api {
                cause: Some(cause), ..
            }) if is_thread_not_found(&cause) => {
                tracing::warn!(thread_id = %thread_id, "Assistant thread no longer exists");
                Err(AssistantError::ThreadNotFound)
            }
            other => other,
        }
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, AssistantError> {
        let options = FetchOptions::json(Method::Post).with_headers(self.headers.iter().cloned());
        let response = self
            .fetch
            .fetch(path, body, &options)
            .await
            .map_err(AssistantError::from_fetch)?;

        serde_json::from_value(response.data).map_err(|e| {
            AssistantError::api(format!("Failed to parse assistant response: {e}"))
        })
    }
}

fn is_thread_not_found(cause: &FetchError) -> bool {
    cause.status == Some(404) && cause.detail() == Some(THREAD_NOT_FOUND_DETAIL)
}

/// Race `call` against `cancel`. A token that has already fired wins before
/// the call is ever polled; the losing future is dropped, not awaited.
async fn with_abort<T>(
    call: impl Future<Output = Result<T, AssistantError>>,
    cancel: &CancellationToken,
) -> Result<T, AssistantError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(AssistantError::Aborted),
        result = call => result,
    }
}
