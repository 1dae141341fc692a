//! Chat Client Trait Abstractions
//!
//! These traits enable full test coverage via MockChatClient: the admission
//! engine is written against `ChatClient` and never touches the Telegram
//! transport directly.

use async_trait::async_trait;
use std::fmt;

/// Platform user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Group or channel chat identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a message the bot has sent (for later deletion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub i64);

/// Membership status of a user in a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

impl MemberStatus {
    /// Whether this status counts as currently belonging to the channel.
    ///
    /// `Restricted` users are still members; only `Left` and `Kicked` are
    /// treated as "not currently a member" for policy purposes.
    pub fn is_current_member(&self) -> bool {
        !matches!(self, MemberStatus::Left | MemberStatus::Kicked)
    }
}

/// Inbound event delivered by the platform.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A user asked to join a gated group.
    JoinRequest { chat: ChatId, user: UserId },

    /// A user pressed an inline button on one of our messages.
    Callback {
        user: UserId,
        message: MessageId,
        data: String,
    },

    /// A plain text message in the bot's private chat (commands and
    /// owner-dialog input).
    Text { user: UserId, text: String },
}

/// Inline button attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    /// Opens a URL (join links).
    Url(String),
    /// Sends a callback event with this payload (verify button).
    Callback(String),
}

/// Inline keyboard: rows of buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.rows.push(buttons);
        self
    }
}

/// Result type for chat platform operations.
pub type ChatResult<T> = Result<T, ChatError>;

/// Chat platform errors.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// Chat platform abstraction.
///
/// The production implementation is `TelegramClient`; tests use
/// `MockChatClient`. Every method is a suspension point — the engine never
/// performs platform I/O outside this trait.
#[async_trait]
pub trait ChatClient: Clone + Send + Sync + 'static {
    /// Query a user's membership status in a channel.
    ///
    /// `channel` is a queryable identity: an `@username` or a numeric chat
    /// id string.
    async fn query_membership(&self, channel: &str, user: UserId) -> ChatResult<MemberStatus>;

    /// Approve a pending join request. Irreversible once it succeeds.
    async fn approve_join_request(&self, chat: ChatId, user: UserId) -> ChatResult<()>;

    /// Decline a pending join request. The user may submit a new one.
    async fn decline_join_request(&self, chat: ChatId, user: UserId) -> ChatResult<()>;

    /// Send a private message, optionally with an inline keyboard.
    /// Returns the sent message's id.
    async fn send_message(
        &self,
        recipient: UserId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> ChatResult<MessageId>;

    /// Delete a previously sent message (stale verification prompts).
    async fn delete_message(&self, recipient: UserId, message: MessageId) -> ChatResult<()>;

    /// Fetch the next batch of inbound events (long poll).
    async fn next_events(&self) -> ChatResult<Vec<ChatEvent>>;
}
