//! Property-based tests for the conversation store and turns
//!
//! These tests check invariants that must hold for any sequence of
//! operations, not just the scripted scenarios.

use super::*;
use crate::client::testing::MockFetch;
use crate::client::{FetchError, Role};
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

// ============================================================================
// Arbitrary Generators
// ============================================================================

#[derive(Debug, Clone)]
enum StoreOp {
    Add(String),
    Update(String, String),
    Remove(String),
    Get(String),
    SetThinking(bool),
    SetError(String),
    Reset,
}

fn arb_id() -> impl Strategy<Value = String> {
    "[a-e]".prop_map(String::from)
}

fn arb_store_op() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        4 => arb_id().prop_map(StoreOp::Add),
        2 => (arb_id(), "[a-z]{0,8}").prop_map(|(id, c)| StoreOp::Update(id, c)),
        2 => arb_id().prop_map(StoreOp::Remove),
        2 => arb_id().prop_map(StoreOp::Get),
        1 => any::<bool>().prop_map(StoreOp::SetThinking),
        1 => "[a-z]{1,8}".prop_map(StoreOp::SetError),
        1 => Just(StoreOp::Reset),
    ]
}

#[derive(Debug, Clone, Copy)]
enum Reply {
    Ok,
    ApiError,
    ThreadGone,
}

fn arb_reply() -> impl Strategy<Value = Reply> {
    prop_oneof![
        3 => Just(Reply::Ok),
        1 => Just(Reply::ApiError),
        1 => Just(Reply::ThreadGone),
    ]
}

fn message(id: &str) -> AssistantMessage {
    AssistantMessage {
        id: id.to_string(),
        role: Role::User,
        status: MessageStatus::Sent,
        content: String::new(),
    }
}

fn has_unique_ids(messages: &[AssistantMessage]) -> bool {
    let mut seen = HashSet::new();
    messages.iter().all(|m| seen.insert(m.id.as_str()))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Adding only fresh ids keeps ids unique and order stable
    #[test]
    fn prop_store_keeps_ids_unique(ops in proptest::collection::vec(arb_store_op(), 0..40)) {
        let store = StateStore::new();

        for op in ops {
            match op {
                StoreOp::Add(id) => {
                    if store.get_message_by_id(&id).is_err() {
                        store.add_message(message(&id));
                        prop_assert_eq!(store.error_message(), None);
                        let last = store.messages().pop().map(|m| m.id);
                        prop_assert_eq!(last.as_deref(), Some(id.as_str()));
                    }
                }
                StoreOp::Update(id, content) => {
                    let before = store.snapshot();
                    let result = store.update_message_by_id(&id, |m| AssistantMessage {
                        content: content.clone(),
                        ..m
                    });
                    match before.message(&id) {
                        Some(_) => {
                            prop_assert!(result.is_ok());
                            prop_assert_eq!(store.get_message_by_id(&id).map(|m| m.content), Ok(content));
                            prop_assert_eq!(store.messages().len(), before.messages.len());
                        }
                        None => {
                            prop_assert_eq!(result, Err(StoreError::MessageNotFound(id)));
                            prop_assert_eq!(store.snapshot(), before);
                        }
                    }
                }
                StoreOp::Remove(id) => {
                    let before = store.messages().len();
                    let existed = store.get_message_by_id(&id).is_ok();
                    store.remove_message_by_id(&id);
                    prop_assert!(store.get_message_by_id(&id).is_err());
                    prop_assert_eq!(store.messages().len(), before - usize::from(existed));
                }
                StoreOp::Get(id) => {
                    let before = store.snapshot();
                    let _ = store.get_message_by_id(&id);
                    prop_assert_eq!(store.snapshot(), before);
                }
                StoreOp::SetThinking(thinking) => {
                    store.set_thinking(thinking);
                    prop_assert_eq!(store.thinking(), thinking);
                }
                StoreOp::SetError(text) => {
                    store.set_error_message(text.clone());
                    prop_assert_eq!(store.error_message(), Some(text));
                }
                StoreOp::Reset => {
                    store.reset();
                    prop_assert_eq!(store.snapshot(), ConversationState::default());
                }
            }
            prop_assert!(has_unique_ids(&store.messages()));
        }
    }

    // After any sequence of settled turns nothing is left pending, thinking is
    // off and every reply is paired with the question before it
    #[test]
    fn prop_settled_turns_leave_no_pending_messages(
        replies in proptest::collection::vec(arb_reply(), 1..8)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let fetch = Arc::new(MockFetch::new());
            let conv = Conversation::new(AssistantClient::new(fetch.clone()), StateStore::new());

            for (i, reply) in replies.iter().enumerate() {
                if !conv.store().snapshot().has_thread() {
                    fetch.queue_ok(json!({ "thread_id": "T1" }));
                }
                match reply {
                    Reply::Ok => fetch.queue_ok(json!({
                        "id": format!("M{i}"),
                        "role": "assistant",
                        "content": format!("answer {i}"),
                    })),
                    Reply::ApiError => fetch.queue_err(FetchError::with_status(500, json!("boom"))),
                    Reply::ThreadGone => fetch.queue_err(FetchError::with_status(
                        404,
                        json!({ "detail": "Thread not found" }),
                    )),
                }

                let result = conv.add_message(&format!("question {i}"), "").await;
                let state = conv.store().snapshot();

                prop_assert!(!state.thinking);
                prop_assert!(state.messages.iter().all(|m| !m.is_pending()));
                prop_assert!(has_unique_ids(&state.messages));
                prop_assert_eq!(result.is_ok(), matches!(reply, Reply::Ok));
                prop_assert_eq!(state.error_message.is_none(), matches!(reply, Reply::Ok));

                for (j, m) in state.messages.iter().enumerate() {
                    if m.role == Role::Assistant {
                        prop_assert!(j > 0);
                        prop_assert_eq!(state.messages[j - 1].status, MessageStatus::Sent);
                    }
                }
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
