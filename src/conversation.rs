//! Conversation orchestrator
//!
//! Turns a submitted user message into a full turn: optimistic insertion of
//! the question and a reply placeholder, lazy thread creation, the message
//! exchange, then reconciliation or rollback. At most one turn is live; a new
//! turn, an interrupt or a reset supersedes the previous one, and a superseded
//! turn only ever rolls back its own messages.

pub mod state;
mod turn;

#[cfg(test)]
mod proptests;

pub use state::{AssistantMessage, ConversationState, MessageStatus, StateStore, StoreError};
pub use turn::{TurnOutcome, TurnPhase, TurnToken};

use crate::client::{AssistantClient, AssistantError, Message};
use std::sync::{Mutex, MutexGuard, PoisonError};
use turn::TurnSlot;

/// One conversation with the assistant
pub struct Conversation {
    client: AssistantClient,
    store: StateStore,
    turn: Mutex<TurnSlot>,
}

impl Conversation {
    pub fn new(client: AssistantClient, store: StateStore) -> Self {
        Self {
            client,
            store,
            turn: Mutex::new(TurnSlot::default()),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Run one turn for `message`, with `query` as the editor context.
    ///
    /// Interruption is not an error: it yields [`TurnOutcome::Aborted`].
    /// Other failures are recorded in the state and returned.
    pub async fn add_message(
        &self,
        message: &str,
        query: &str,
    ) -> Result<TurnOutcome, AssistantError> {
        if !self.store.try_begin_turn() {
            tracing::debug!("Turn already in flight, ignoring message");
            return Ok(TurnOutcome::Skipped);
        }

        let token = self.lock_turn().begin();
        tracing::debug!(generation = token.generation(), phase = ?TurnPhase::Sending, "Turn started");

        let question = AssistantMessage::question(message);
        let answer = AssistantMessage::placeholder();
        self.store.add_message(question.clone());
        self.store.add_message(answer.clone());
        let mut pending = PendingTurn {
            conversation: self,
            token,
            question_id: question.id.clone(),
            answer_id: answer.id.clone(),
            armed: true,
        };

        let result = self.exchange(&pending.token, message, query).await;
        pending.disarm();
        let token = &pending.token;

        // Settle under the slot lock so an interrupt cannot land between the
        // ownership check and the writes
        let mut slot = self.lock_turn();
        let outcome = if slot.is_current(token) {
            self.settle(result, &question.id, &answer.id)
        } else {
            if result.is_ok() {
                tracing::info!(generation = token.generation(), "Discarding reply of superseded turn");
            }
            self.roll_back(&question.id, &answer.id);
            Ok(TurnOutcome::Aborted)
        };

        if slot.finish(token) {
            self.store.set_thinking(false);
        }
        outcome
    }

    /// Interrupt the live turn. Its messages are rolled back once the
    /// interrupted call settles.
    pub fn abort(&self) {
        if self.lock_turn().abort() {
            tracing::info!("Turn interrupted");
        }
        self.store.set_thinking(false);
    }

    /// Interrupt and forget the whole conversation, thread included
    pub fn reset(&self) {
        self.abort();
        self.store.reset();
        tracing::info!("Conversation reset");
    }

    async fn exchange(
        &self,
        token: &TurnToken,
        message: &str,
        query: &str,
    ) -> Result<Message, AssistantError> {
        let thread_id = self.resolve_thread(token, query).await?;
        tracing::debug!(thread_id = %thread_id, phase = ?TurnPhase::AwaitingReply, "Sending message");

        self.client
            .send_message(&thread_id, message, query, token.cancellation())
            .await
    }

    /// Existing thread id, or a freshly created one
    async fn resolve_thread(
        &self,
        token: &TurnToken,
        query: &str,
    ) -> Result<String, AssistantError> {
        let existing = self.store.thread_id();
        if !existing.is_empty() {
            return Ok(existing);
        }

        let thread = self
            .client
            .create_thread(query, token.cancellation())
            .await?;
        if thread.thread_id.is_empty() {
            return Err(AssistantError::api("Assistant returned an empty thread id"));
        }

        // A reset while the thread was being created must not get it back
        let slot = self.lock_turn();
        if !slot.is_current(token) {
            return Err(AssistantError::Aborted);
        }
        self.store.set_thread_id(thread.thread_id.clone());
        tracing::info!(thread_id = %thread.thread_id, phase = ?TurnPhase::ThreadReady, "Assistant thread created");

        Ok(thread.thread_id)
    }

    fn settle(
        &self,
        result: Result<Message, AssistantError>,
        question_id: &str,
        answer_id: &str,
    ) -> Result<TurnOutcome, AssistantError> {
        match result {
            Ok(reply) => {
                self.set_status(question_id, MessageStatus::Sent);
                let reconciled = self.store.update_message_by_id(answer_id, |m| AssistantMessage {
                    id: reply.id.clone(),
                    status: MessageStatus::Received,
                    content: reply.content.clone(),
                    ..m
                });
                let reply_id = match reconciled {
                    Ok(()) => reply.id,
                    Err(StoreError::DuplicateId(id)) => {
                        // Ids must stay unique, so the reply keeps its local one
                        tracing::error!(reply_id = %id, "Assistant reused a message id");
                        let received = self.store.update_message_by_id(answer_id, |m| {
                            AssistantMessage {
                                status: MessageStatus::Received,
                                content: reply.content,
                                ..m
                            }
                        });
                        if let Err(e) = received {
                            tracing::error!(error = %e, "Failed to reconcile assistant reply");
                        }
                        answer_id.to_string()
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to reconcile assistant reply");
                        reply.id
                    }
                };
                Ok(TurnOutcome::Completed { reply_id })
            }
            Err(AssistantError::Aborted) => {
                self.roll_back(question_id, answer_id);
                Ok(TurnOutcome::Aborted)
            }
            Err(e) => {
                self.store.remove_message_by_id(answer_id);
                self.set_status(question_id, MessageStatus::Failed);
                if let Some(text) = e.user_message() {
                    self.store.set_error_message(text);
                }
                tracing::warn!(error = %e, status = ?e.status(), "Assistant turn failed");
                Err(e)
            }
        }
    }

    /// The turn never happened as far as the user is concerned
    fn roll_back(&self, question_id: &str, answer_id: &str) {
        self.store.remove_message_by_id(answer_id);
        self.store.remove_message_by_id(question_id);
    }

    fn set_status(&self, id: &str, status: MessageStatus) {
        if let Err(e) = self
            .store
            .update_message_by_id(id, |m| AssistantMessage { status, ..m })
        {
            tracing::error!(error = %e, "Failed to update message status");
        }
    }

    fn lock_turn(&self) -> MutexGuard<'_, TurnSlot> {
        self.turn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Optimistic messages of a turn that has not settled yet. Dropping it armed
/// (the turn future was dropped mid-flight) rolls the turn back.
struct PendingTurn<'a> {
    conversation: &'a Conversation,
    token: TurnToken,
    question_id: String,
    answer_id: String,
    armed: bool,
}

impl PendingTurn<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingTurn<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let conversation = self.conversation;
        tracing::info!(generation = self.token.generation(), "Turn dropped before settling");

        let mut slot = conversation.lock_turn();
        conversation.roll_back(&self.question_id, &self.answer_id);
        if slot.finish(&self.token) {
            self.token.cancellation().cancel();
            conversation.store.set_thinking(false);
        }
    }
}
