//! Chat platform integration.
//!
//! The engine talks to the platform only through the `ChatClient` trait.
//! `TelegramClient` is the production implementation; `MockChatClient`
//! drives tests.

pub mod mock;
pub mod telegram;
pub mod traits;

pub use mock::MockChatClient;
pub use telegram::TelegramClient;
pub use traits::{ChatClient, ChatError, ChatEvent, ChatId, ChatResult, MemberStatus, UserId};
