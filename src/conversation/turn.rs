//! In-flight turn bookkeeping

use tokio_util::sync::CancellationToken;

/// Phase of the turn currently running, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Sending,
    ThreadReady,
    AwaitingReply,
}

/// How a turn ended when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply arrived and both messages were reconciled
    Completed { reply_id: String },
    /// Interrupted, reset or superseded; the turn's messages were rolled back
    Aborted,
    /// Another turn was already in flight; nothing happened
    Skipped,
}

/// Cancellation handle of one turn
#[derive(Debug, Clone)]
pub struct TurnToken {
    generation: u64,
    cancel: CancellationToken,
}

impl TurnToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Holds at most one live turn token
#[derive(Debug, Default)]
pub struct TurnSlot {
    current: Option<TurnToken>,
    generations: u64,
}

impl TurnSlot {
    /// Start a turn, cancelling whichever one was live
    pub fn begin(&mut self) -> TurnToken {
        if let Some(previous) = self.current.take() {
            previous.cancel.cancel();
        }
        self.generations += 1;
        let token = TurnToken {
            generation: self.generations,
            cancel: CancellationToken::new(),
        };
        self.current = Some(token.clone());
        token
    }

    /// Cancel and forget the live turn. Returns whether there was one.
    pub fn abort(&mut self) -> bool {
        match self.current.take() {
            Some(token) => {
                token.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_current(&self, token: &TurnToken) -> bool {
        self.current
            .as_ref()
            .is_some_and(|c| c.generation == token.generation)
    }

    /// Release the slot if `token` still owns it
    pub fn finish(&mut self, token: &TurnToken) -> bool {
        if self.is_current(token) {
            self.current = None;
            true
        } else {
            false
        }
    }
}
