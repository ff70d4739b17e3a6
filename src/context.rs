//! Binding between a consuming surface and its conversation
//!
//! A [`ConversationContext`] owns one orchestrator and the store it writes to.
//! Surfaces act through it and read the state back through selectors; a
//! [`Selection`] only wakes its reader when its slice of the state changes.

use crate::client::{AssistantClient, AssistantError, Fetch};
use crate::conversation::{
    AssistantMessage, Conversation, ConversationState, StateStore, TurnOutcome,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::Stream;

/// One conversation as seen by one surface
#[derive(Clone)]
pub struct ConversationContext {
    conversation: Arc<Conversation>,
}

impl ConversationContext {
    pub fn new(fetch: Arc<dyn Fetch>) -> Self {
        Self::with_history(fetch, Vec::new())
    }

    /// Context whose conversation starts from an existing history
    pub fn with_history(fetch: Arc<dyn Fetch>, messages: Vec<AssistantMessage>) -> Self {
        Self::from_client(AssistantClient::new(fetch), StateStore::with_messages(messages))
    }

    pub fn from_client(client: AssistantClient, store: StateStore) -> Self {
        Self {
            conversation: Arc::new(Conversation::new(client, store)),
        }
    }

    fn store(&self) -> &StateStore {
        self.conversation.store()
    }

    // ------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------

    pub async fn send_user_message(
        &self,
        message: &str,
        query: &str,
    ) -> Result<TurnOutcome, AssistantError> {
        self.conversation.add_message(message, query).await
    }

    /// Run a turn in the background. Failures are already in the state; the
    /// handle only reports them again.
    pub fn spawn_user_message(
        &self,
        message: impl Into<String>,
        query: impl Into<String>,
    ) -> JoinHandle<Result<TurnOutcome, AssistantError>> {
        let conversation = self.conversation.clone();
        let message = message.into();
        let query = query.into();

        tokio::spawn(async move {
            let result = conversation.add_message(&message, &query).await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "Assistant turn failed");
            }
            result
        })
    }

    pub fn interrupt(&self) {
        self.conversation.abort();
    }

    pub fn reset_conversation(&self) {
        self.conversation.reset();
    }

    pub fn dismiss_error(&self) {
        self.store().clear_error_message();
    }

    // ------------------------------------------------------------------
    // Selectors
    // ------------------------------------------------------------------

    pub fn messages(&self) -> Vec<AssistantMessage> {
        self.store().messages()
    }

    pub fn thinking(&self) -> bool {
        self.store().thinking()
    }

    pub fn error_message(&self) -> Option<String> {
        self.store().error_message()
    }

    pub fn thread_id(&self) -> String {
        self.store().thread_id()
    }

    pub fn snapshot(&self) -> ConversationState {
        self.store().snapshot()
    }

    /// Watch one slice of the state
    pub fn select<T, F>(&self, project: F) -> Selection<T, F>
    where
        T: Clone + PartialEq,
        F: Fn(&ConversationState) -> T,
    {
        Selection::new(self.store().subscribe(), project)
    }

    /// Every state the store publishes, starting with the current one
    pub fn updates(&self) -> impl Stream<Item = ConversationState> {
        WatchStream::new(self.store().subscribe())
    }
}

/// A projection of the conversation state that tracks its last value
pub struct Selection<T, F> {
    rx: watch::Receiver<ConversationState>,
    project: F,
    current: T,
}

impl<T, F> Selection<T, F>
where
    T: Clone + PartialEq,
    F: Fn(&ConversationState) -> T,
{
    fn new(mut rx: watch::Receiver<ConversationState>, project: F) -> Self {
        let current = project(&rx.borrow_and_update());
        Self {
            rx,
            project,
            current,
        }
    }

    pub fn get(&self) -> T {
        self.current.clone()
    }

    /// Wait until the projected value differs from the last one seen.
    /// Returns `None` once the conversation is gone.
    pub async fn changed(&mut self) -> Option<T> {
        loop {
            self.rx.changed().await.ok()?;
            let next = (self.project)(&self.rx.borrow_and_update());
            if next != self.current {
                self.current = next.clone();
                return Some(next);
            }
        }
    }
}

/// Conversations keyed by the surface that owns them
pub struct ContextRegistry {
    fetch: Arc<dyn Fetch>,
    contexts: RwLock<HashMap<String, ConversationContext>>,
}

impl ContextRegistry {
    pub fn new(fetch: Arc<dyn Fetch>) -> Self {
        Self {
            fetch,
            contexts: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_or_create(&self, surface_id: &str) -> ConversationContext {
        if let Some(context) = self.contexts.read().await.get(surface_id) {
            return context.clone();
        }

        let mut contexts = self.contexts.write().await;
        contexts
            .entry(surface_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(surface_id = %surface_id, "Creating conversation context");
                ConversationContext::new(self.fetch.clone())
            })
            .clone()
    }

    pub async fn get(&self, surface_id: &str) -> Option<ConversationContext> {
        self.contexts.read().await.get(surface_id).cloned()
    }

    /// Drop a surface's conversation, interrupting any turn it has in flight
    pub async fn remove(&self, surface_id: &str) -> bool {
        match self.contexts.write().await.remove(surface_id) {
            Some(context) => {
                context.reset_conversation();
                tracing::debug!(surface_id = %surface_id, "Removed conversation context");
                true
            }
            None => false,
        }
    }

    pub async fn surfaces(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.contexts.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
