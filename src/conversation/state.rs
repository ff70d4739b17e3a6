//! Conversation state and its store

use crate::client::Role;
use crate::markdown::{self, CodeBlock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Lifecycle of a single message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// User message posted, reply not yet in
    Sending,
    Sent,
    /// Assistant placeholder waiting for its content
    Receiving,
    Received,
    /// User message whose turn failed
    Failed,
}

/// A message as shown in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub id: String,
    pub role: Role,
    pub status: MessageStatus,
    pub content: String,
}

impl AssistantMessage {
    /// Optimistic user entry for a turn that has just started
    pub fn question(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::User,
            status: MessageStatus::Sending,
            content: content.into(),
        }
    }

    /// Empty assistant entry shown while the reply is pending
    pub fn placeholder() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::Assistant,
            status: MessageStatus::Receiving,
            content: String::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, MessageStatus::Sending | MessageStatus::Receiving)
    }

    /// Fenced code blocks in the message content
    pub fn code_blocks(&self) -> Vec<CodeBlock> {
        markdown::code_blocks(&self.content)
    }
}

/// Everything a renderer needs to draw a conversation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversationState {
    /// Empty until the first turn creates a thread
    pub thread_id: String,
    pub messages: Vec<AssistantMessage>,
    pub thinking: bool,
    pub error_message: Option<String>,
}

impl ConversationState {
    pub fn has_thread(&self) -> bool {
        !self.thread_id.is_empty()
    }

    pub fn message(&self, id: &str) -> Option<&AssistantMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Most recent reply that actually arrived
    pub fn last_reply(&self) -> Option<&AssistantMessage> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && m.status == MessageStatus::Received)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("No message with id [{0}] found")]
    MessageNotFound(String),
    #[error("Another message already has id [{0}]")]
    DuplicateId(String),
}

/// Single source of truth for one conversation.
///
/// Every operation is one update of the underlying watch channel, so
/// observers never see a half-applied mutation.
#[derive(Debug, Clone)]
pub struct StateStore {
    tx: Arc<watch::Sender<ConversationState>>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self::with_messages(Vec::new())
    }

    /// Store pre-seeded with an existing history
    pub fn with_messages(messages: Vec<AssistantMessage>) -> Self {
        let (tx, _) = watch::channel(ConversationState {
            messages,
            ..ConversationState::default()
        });
        Self { tx: Arc::new(tx) }
    }

    /// Receiver notified after every mutation
    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> ConversationState {
        self.tx.borrow().clone()
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Append a message; a new message dismisses any error
    pub fn add_message(&self, message: AssistantMessage) {
        self.tx.send_modify(|state| {
            state.messages.push(message);
            state.error_message = None;
        });
    }

    /// Replace the message carrying the same id
    pub fn update_message(&self, message: AssistantMessage) -> Result<(), StoreError> {
        let id = message.id.clone();
        self.update_message_by_id(&id, |_| message)
    }

    /// Transform the message with `id` in place. Fails without mutating when
    /// the id is unknown or the new id belongs to another message.
    pub fn update_message_by_id(
        &self,
        id: &str,
        transform: impl FnOnce(AssistantMessage) -> AssistantMessage,
    ) -> Result<(), StoreError> {
        let mut result = Err(StoreError::MessageNotFound(id.to_string()));
        self.tx.send_if_modified(|state| {
            let Some(index) = state.messages.iter().position(|m| m.id == id) else {
                return false;
            };
            let updated = transform(state.messages[index].clone());
            if updated.id != id && state.messages.iter().any(|m| m.id == updated.id) {
                result = Err(StoreError::DuplicateId(updated.id));
                return false;
            }
            state.messages[index] = updated;
            result = Ok(());
            true
        });
        result
    }

    pub fn get_message_by_id(&self, id: &str) -> Result<AssistantMessage, StoreError> {
        self.tx
            .borrow()
            .message(id)
            .cloned()
            .ok_or_else(|| StoreError::MessageNotFound(id.to_string()))
    }

    /// Drop the message if present
    pub fn remove_message_by_id(&self, id: &str) {
        self.tx.send_if_modified(|state| {
            let before = state.messages.len();
            state.messages.retain(|m| m.id != id);
            state.messages.len() != before
        });
    }

    pub fn messages(&self) -> Vec<AssistantMessage> {
        self.tx.borrow().messages.clone()
    }

    // ------------------------------------------------------------------
    // Thread, thinking, error
    // ------------------------------------------------------------------

    pub fn set_thread_id(&self, thread_id: impl Into<String>) {
        let thread_id = thread_id.into();
        self.tx.send_if_modified(|state| {
            if state.thread_id == thread_id {
                return false;
            }
            state.thread_id = thread_id;
            true
        });
    }

    pub fn thread_id(&self) -> String {
        self.tx.borrow().thread_id.clone()
    }

    pub fn set_thinking(&self, thinking: bool) {
        self.tx.send_if_modified(|state| {
            let changed = state.thinking != thinking;
            state.thinking = thinking;
            changed
        });
    }

    pub fn thinking(&self) -> bool {
        self.tx.borrow().thinking
    }

    /// Set `thinking` unless it already is; `false` means a turn is in flight
    pub fn try_begin_turn(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if state.thinking {
                return false;
            }
            state.thinking = true;
            true
        })
    }

    pub fn set_error_message(&self, message: impl Into<String>) {
        let message = message.into();
        self.tx.send_modify(|state| state.error_message = Some(message));
    }

    pub fn clear_error_message(&self) {
        self.tx
            .send_if_modified(|state| state.error_message.take().is_some());
    }

    pub fn error_message(&self) -> Option<String> {
        self.tx.borrow().error_message.clone()
    }

    /// Back to an empty conversation
    pub fn reset(&self) {
        self.tx.send_modify(|state| *state = ConversationState::default());
    }
}
