//! Assistant API error types

use super::FetchError;
use thiserror::Error;

/// Text shown when the backend no longer knows the conversation's thread.
/// The raw backend detail is not actionable, a reset is.
pub const CONVERSATION_UNAVAILABLE: &str = "Conversation unavailable, reset it to continue";

/// Backend detail returned with a 404 when a thread id is unknown
pub(crate) const THREAD_NOT_FOUND_DETAIL: &str = "Thread not found";

/// Outcome of a failed assistant call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssistantError {
    /// Non-2xx response, transport failure or undecodable body
    #[error("{message}")]
    Api {
        message: String,
        #[source]
        cause: Option<FetchError>,
    },

    /// The thread backing this conversation is gone on the server side.
    /// Retrying cannot help; the conversation has to be reset.
    #[error("Thread not found")]
    ThreadNotFound,

    /// The caller cancelled before the call settled
    #[error("Request aborted by user")]
    Aborted,
}

impl AssistantError {
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
            cause: None,
        }
    }

    /// Wrap a fetch failure, extracting the most useful message from its body
    pub fn from_fetch(cause: FetchError) -> Self {
        Self::Api {
            message: cause.message(),
            cause: Some(cause),
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// HTTP status of the underlying response, if there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api {
                cause: Some(cause), ..
            } => cause.status,
            Self::ThreadNotFound => Some(404),
            _ => None,
        }
    }

    /// Message to put in front of the user, `None` when nothing should be shown
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::Api { message, .. } => Some(message.clone()),
            Self::ThreadNotFound => Some(CONVERSATION_UNAVAILABLE.to_string()),
            Self::Aborted => None,
        }
    }
}
