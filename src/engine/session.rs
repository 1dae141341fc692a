//! Awaiting-verification session tracking.
//!
//! After a join request is declined, the requester sits in an
//! awaiting-verification session until a re-check passes. Sessions are
//! in-memory only: a restart simply means the user presses Verify again.
//! The tracked prompt message id lets a re-prompt delete its predecessor.

use crate::chat::traits::{MessageId, UserId};
use std::collections::HashMap;

/// One user's awaiting-verification session.
#[derive(Debug, Clone)]
pub struct VerificationSession {
    pub user: UserId,

    /// Id of the last prompt message we sent, if the send succeeded.
    pub prompt_message: Option<MessageId>,
}

/// In-memory session tracker.
#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: HashMap<UserId, VerificationSession>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) a session, replacing any previous prompt id.
    pub fn begin(&mut self, user: UserId, prompt_message: Option<MessageId>) {
        self.sessions.insert(
            user,
            VerificationSession {
                user,
                prompt_message,
            },
        );
    }

    /// Id of the user's outstanding prompt message, if any.
    pub fn prompt_message(&self, user: UserId) -> Option<MessageId> {
        self.sessions.get(&user).and_then(|s| s.prompt_message)
    }

    /// End a session after a successful re-check.
    pub fn complete(&mut self, user: UserId) -> Option<VerificationSession> {
        self.sessions.remove(&user)
    }

    pub fn is_awaiting(&self, user: UserId) -> bool {
        self.sessions.contains_key(&user)
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }
}
