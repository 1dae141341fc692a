//! Telegram Bot API client.
//!
//! Implements `ChatClient` over the HTTP Bot API with long polling. Only the
//! handful of methods the engine needs are wired up: `getUpdates`,
//! `getChatMember`, `approveChatJoinRequest`, `declineChatJoinRequest`,
//! `sendMessage` and `deleteMessage`.

use super::traits::*;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Long-poll window requested from getUpdates, in seconds.
const POLL_TIMEOUT_SECS: u64 = 25;

/// Telegram Bot API client.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    /// Next getUpdates offset (last seen update_id + 1).
    offset: Arc<Mutex<i64>>,
}

/// Standard Bot API response envelope.
#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<IncomingMessage>,
    callback_query: Option<CallbackQuery>,
    chat_join_request: Option<JoinRequestUpdate>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    message_id: i64,
    from: Option<User>,
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: User,
    message: Option<IncomingMessage>,
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JoinRequestUpdate {
    chat: Chat,
    from: User,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMember {
    status: String,
}

#[derive(Debug, Deserialize)]
struct SentMessageResult {
    message_id: i64,
}

impl TelegramClient {
    pub fn new(token: &str) -> ChatResult<Self> {
        let http = reqwest::Client::builder()
            // Must outlast the long-poll window
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 15))
            .build()
            .map_err(|e| ChatError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: format!("https://api.telegram.org/bot{token}"),
            offset: Arc::new(Mutex::new(0)),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> ChatResult<T> {
        let url = format!("{}/{method}", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&params)
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))?;

        if body.ok {
            body.result
                .ok_or_else(|| ChatError::Decode(format!("{method}: missing result")))
        } else {
            let description = body.description.unwrap_or_default();
            if description.contains("chat not found") {
                Err(ChatError::ChatNotFound(description))
            } else {
                Err(ChatError::Api {
                    code: body.error_code.unwrap_or(0),
                    description,
                })
            }
        }
    }
}

/// Bot API chat_id values are integers or `@username` strings.
fn chat_id_value(identity: &str) -> Value {
    match identity.parse::<i64>() {
        Ok(numeric) => json!(numeric),
        Err(_) => json!(identity),
    }
}

fn parse_status(status: &str) -> MemberStatus {
    match status {
        "creator" => MemberStatus::Creator,
        "administrator" => MemberStatus::Administrator,
        "member" => MemberStatus::Member,
        "restricted" => MemberStatus::Restricted,
        "kicked" => MemberStatus::Kicked,
        // "left" and anything unknown fail closed
        _ => MemberStatus::Left,
    }
}

fn keyboard_markup(keyboard: &Keyboard) -> Value {
    let rows: Vec<Vec<Value>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| match &button.action {
                    ButtonAction::Url(url) => json!({ "text": button.label, "url": url }),
                    ButtonAction::Callback(data) => {
                        json!({ "text": button.label, "callback_data": data })
                    }
                })
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

/// Map one Bot API update to an engine event, if it is one we handle.
fn event_from_update(update: &Update) -> Option<ChatEvent> {
    if let Some(request) = &update.chat_join_request {
        return Some(ChatEvent::JoinRequest {
            chat: ChatId(request.chat.id),
            user: UserId(request.from.id),
        });
    }
    if let Some(callback) = &update.callback_query {
        return Some(ChatEvent::Callback {
            user: UserId(callback.from.id),
            message: MessageId(callback.message.as_ref().map(|m| m.message_id).unwrap_or(0)),
            data: callback.data.clone().unwrap_or_default(),
        });
    }
    if let Some(message) = &update.message {
        // Only private-chat text drives commands and dialogs.
        if message.chat.kind.as_deref() == Some("private") {
            if let (Some(from), Some(text)) = (&message.from, &message.text) {
                return Some(ChatEvent::Text {
                    user: UserId(from.id),
                    text: text.clone(),
                });
            }
        }
    }
    None
}

#[async_trait]
impl ChatClient for TelegramClient {
    async fn query_membership(&self, channel: &str, user: UserId) -> ChatResult<MemberStatus> {
        let member: ChatMember = self
            .call(
                "getChatMember",
                json!({ "chat_id": chat_id_value(channel), "user_id": user.0 }),
            )
            .await?;
        Ok(parse_status(&member.status))
    }

    async fn approve_join_request(&self, chat: ChatId, user: UserId) -> ChatResult<()> {
        let _: bool = self
            .call(
                "approveChatJoinRequest",
                json!({ "chat_id": chat.0, "user_id": user.0 }),
            )
            .await?;
        Ok(())
    }

    async fn decline_join_request(&self, chat: ChatId, user: UserId) -> ChatResult<()> {
        let _: bool = self
            .call(
                "declineChatJoinRequest",
                json!({ "chat_id": chat.0, "user_id": user.0 }),
            )
            .await?;
        Ok(())
    }

    async fn send_message(
        &self,
        recipient: UserId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> ChatResult<MessageId> {
        let mut params = json!({ "chat_id": recipient.0, "text": text });
        if let Some(kb) = keyboard {
            params["reply_markup"] = keyboard_markup(kb);
        }
        let sent: SentMessageResult = self.call("sendMessage", params).await?;
        Ok(MessageId(sent.message_id))
    }

    async fn delete_message(&self, recipient: UserId, message: MessageId) -> ChatResult<()> {
        let _: bool = self
            .call(
                "deleteMessage",
                json!({ "chat_id": recipient.0, "message_id": message.0 }),
            )
            .await?;
        Ok(())
    }

    async fn next_events(&self) -> ChatResult<Vec<ChatEvent>> {
        let offset = *self.offset.lock().unwrap();
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message", "callback_query", "chat_join_request"],
                }),
            )
            .await?;

        let mut events = Vec::new();
        for update in &updates {
            {
                let mut next = self.offset.lock().unwrap();
                if update.update_id >= *next {
                    *next = update.update_id + 1;
                }
            }

            // Acknowledge button presses so clients stop their spinners.
            if let Some(callback) = &update.callback_query {
                if let Err(e) = self
                    .call::<bool>(
                        "answerCallbackQuery",
                        json!({ "callback_query_id": callback.id }),
                    )
                    .await
                {
                    debug!(error = %e, "answerCallbackQuery failed");
                }
            }

            if let Some(event) = event_from_update(update) {
                events.push(event);
            }
        }
        Ok(events)
    }
}
