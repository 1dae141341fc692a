//! Mock Chat Client for Testing
//!
//! Provides MockChatClient for exercising the admission engine without a
//! real chat platform. Membership state and failures are injectable;
//! approve/decline/send calls are recorded for assertions.

use super::traits::*;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Mock chat client for testing.
#[derive(Clone)]
pub struct MockChatClient {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// (channel identity, user) -> status. Absent pairs report `Left`.
    memberships: HashMap<(String, UserId), MemberStatus>,
    /// Channels whose membership queries fail.
    broken_channels: HashSet<String>,
    /// When true, approve_join_request fails.
    approvals_fail: bool,
    approved: Vec<(ChatId, UserId)>,
    declined: Vec<(ChatId, UserId)>,
    sent_messages: Vec<SentMessage>,
    deleted: Vec<(UserId, MessageId)>,
    incoming: Vec<ChatEvent>,
    next_message_id: i64,
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub recipient: UserId,
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl MockChatClient {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Set a user's membership status in a channel.
    pub fn set_membership(&self, channel: &str, user: UserId, status: MemberStatus) {
        let mut state = self.state.lock().unwrap();
        state.memberships.insert((channel.to_string(), user), status);
    }

    /// Make membership queries against a channel fail.
    pub fn break_channel(&self, channel: &str) {
        let mut state = self.state.lock().unwrap();
        state.broken_channels.insert(channel.to_string());
    }

    /// Make approve_join_request fail.
    pub fn fail_approvals(&self, fail: bool) {
        self.state.lock().unwrap().approvals_fail = fail;
    }

    /// Queue an incoming event for next_events.
    pub fn push_event(&self, event: ChatEvent) {
        self.state.lock().unwrap().incoming.push(event);
    }

    /// Approvals issued so far, in order.
    pub fn approved(&self) -> Vec<(ChatId, UserId)> {
        self.state.lock().unwrap().approved.clone()
    }

    /// Declines issued so far, in order.
    pub fn declined(&self) -> Vec<(ChatId, UserId)> {
        self.state.lock().unwrap().declined.clone()
    }

    /// All sent messages, in order.
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.state.lock().unwrap().sent_messages.clone()
    }

    /// Messages sent to a specific recipient.
    pub fn sent_to(&self, recipient: UserId) -> Vec<SentMessage> {
        self.state
            .lock()
            .unwrap()
            .sent_messages
            .iter()
            .filter(|m| m.recipient == recipient)
            .cloned()
            .collect()
    }

    /// Messages deleted so far.
    pub fn deleted(&self) -> Vec<(UserId, MessageId)> {
        self.state.lock().unwrap().deleted.clone()
    }

    /// Clear all recorded calls (keeps membership setup).
    pub fn clear_recorded(&self) {
        let mut state = self.state.lock().unwrap();
        state.approved.clear();
        state.declined.clear();
        state.sent_messages.clear();
        state.deleted.clear();
    }
}

impl Default for MockChatClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn query_membership(&self, channel: &str, user: UserId) -> ChatResult<MemberStatus> {
        let state = self.state.lock().unwrap();
        if state.broken_channels.contains(channel) {
            return Err(ChatError::ChatNotFound(channel.to_string()));
        }
        Ok(state
            .memberships
            .get(&(channel.to_string(), user))
            .copied()
            .unwrap_or(MemberStatus::Left))
    }

    async fn approve_join_request(&self, chat: ChatId, user: UserId) -> ChatResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.approvals_fail {
            return Err(ChatError::Api {
                code: 400,
                description: "HIDE_REQUESTER_MISSING".to_string(),
            });
        }
        state.approved.push((chat, user));
        Ok(())
    }

    async fn decline_join_request(&self, chat: ChatId, user: UserId) -> ChatResult<()> {
        let mut state = self.state.lock().unwrap();
        state.declined.push((chat, user));
        Ok(())
    }

    async fn send_message(
        &self,
        recipient: UserId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> ChatResult<MessageId> {
        let mut state = self.state.lock().unwrap();
        state.sent_messages.push(SentMessage {
            recipient,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        state.next_message_id += 1;
        Ok(MessageId(state.next_message_id))
    }

    async fn delete_message(&self, recipient: UserId, message: MessageId) -> ChatResult<()> {
        let mut state = self.state.lock().unwrap();
        state.deleted.push((recipient, message));
        Ok(())
    }

    async fn next_events(&self) -> ChatResult<Vec<ChatEvent>> {
        let mut state = self.state.lock().unwrap();
        Ok(state.incoming.drain(..).collect())
    }
}
