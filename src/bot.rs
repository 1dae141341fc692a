//! Turnstile bot: event dispatch.
//!
//! Wires the admission engine, approval scheduler, state store and owner
//! dialogs behind one event loop over a `ChatClient`. Events are handled one
//! at a time; delayed approvals run in the scheduler's own tasks so a
//! pending timer never blocks the loop.

use crate::chat::traits::{ChatClient, ChatEvent, UserId};
use crate::engine::admission::AdmissionEngine;
use crate::engine::scheduler::ApprovalScheduler;
use crate::owner::{self, DialogAction, OwnerDialog, OwnerDialogs};
use crate::store::ConfigStore;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// The bot: one instance drives one chat client.
pub struct TurnstileBot<C: ChatClient> {
    client: C,
    store: ConfigStore,
    engine: AdmissionEngine<C>,
    dialogs: OwnerDialogs,
}

impl<C: ChatClient> TurnstileBot<C> {
    pub fn new(client: C, store: ConfigStore) -> Self {
        let scheduler = ApprovalScheduler::new(client.clone(), store.clone());
        let engine = AdmissionEngine::new(client.clone(), store.clone(), scheduler);
        Self {
            client,
            store,
            engine,
            dialogs: OwnerDialogs::new(),
        }
    }

    /// Run the event loop until the process is stopped.
    pub async fn run(&mut self) {
        info!("Turnstile bot running");
        loop {
            match self.client.next_events().await {
                Ok(events) => {
                    for event in events {
                        self.handle_event(event).await;
                    }
                }
                Err(e) => {
                    error!(error = %e, "Event poll failed; backing off");
                    tokio::time::sleep(Duration::from_secs(3)).await;
                }
            }
        }
    }

    /// Dispatch one inbound event.
    pub async fn handle_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::JoinRequest { chat, user } => {
                let outcome = self.engine.handle_join_request(chat, user).await;
                debug!(%chat, %user, ?outcome, "Join request handled");
            }
            ChatEvent::Callback { user, data, .. } => match data.as_str() {
                crate::engine::prompt::VERIFY_CALLBACK => {
                    self.engine.handle_verification(user).await;
                }
                "no_invite" => {
                    self.reply(
                        user,
                        "⚠️ No invite URL configured for this channel. Contact the owner.",
                    )
                    .await;
                }
                other => debug!(%user, data = other, "Ignoring unknown callback"),
            },
            ChatEvent::Text { user, text } => self.handle_text(user, &text).await,
        }
    }

    async fn handle_text(&mut self, user: UserId, text: &str) {
        let text = text.trim();
        if text.starts_with('/') {
            self.handle_command(user, text).await;
            return;
        }

        // Non-command text only matters inside an owner dialog.
        if self.store.is_owner(user) {
            if let Some(dialog) = self.dialogs.current(user).cloned() {
                self.advance_dialog(user, &dialog, text).await;
            }
        }
    }

    async fn handle_command(&mut self, user: UserId, text: &str) {
        let mut parts = text.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let arg = parts.next();

        if command == "/start" {
            self.engine.handle_start(user).await;
            return;
        }

        // Everything below manages the bot and is owner-only.
        if !self.store.is_owner(user) {
            self.reply(user, "❌ Only owners can use this command.").await;
            return;
        }

        match command {
            "/owner" => self.reply(user, &owner_panel_text()).await,

            "/toggleforce" => {
                let enabled = self.store.toggle_policy();
                let status = if enabled { "Enabled ✅" } else { "Disabled ❌" };
                self.reply(user, &format!("🔒 Force-join: {status}")).await;
                if enabled && self.store.policy().channels.is_empty() {
                    self.reply(
                        user,
                        "⚠️ Force-join enabled but no channels configured. Add one with /addchannel.",
                    )
                    .await;
                }
            }

            "/channels" => {
                let channels = self.store.policy().channels;
                if channels.is_empty() {
                    self.reply(user, "ℹ️ No channels configured.").await;
                } else {
                    let mut lines = vec!["📜 Configured channels:".to_string()];
                    for (i, ch) in channels.iter().enumerate() {
                        lines.push(format!("{}. {} [{}]", i + 1, ch.describe(), ch.join_label()));
                    }
                    self.reply(user, &lines.join("\n")).await;
                }
            }

            "/addchannel" => {
                self.dialogs.start(user, OwnerDialog::AddChannelIdentifier);
                self.reply(
                    user,
                    "➕ Send the channel identifier or invite link.\n\
                     Examples: @MyChannel, -1001234567890, https://t.me/joinchat/XXXX\n\
                     (/cancel to abort)",
                )
                .await;
            }

            "/removechannel" => match arg.and_then(|a| a.parse::<usize>().ok()) {
                Some(position) if position >= 1 => match self.store.remove_channel(position - 1) {
                    Ok(removed) => {
                        self.reply(user, &format!("✅ Removed channel {}", removed.describe()))
                            .await
                    }
                    Err(e) => self.reply(user, &format!("❌ {e}")).await,
                },
                _ => {
                    self.reply(user, "Usage: /removechannel <position> (see /channels)")
                        .await
                }
            },

            "/owners" => {
                let lines: Vec<String> = self
                    .store
                    .owners()
                    .iter()
                    .enumerate()
                    .map(|(i, o)| format!("{}. {o}", i + 1))
                    .collect();
                self.reply(user, &format!("🧑‍💼 Owners:\n{}", lines.join("\n")))
                    .await;
            }

            "/addowner" => {
                self.dialogs.start(user, OwnerDialog::AddOwner);
                self.reply(user, "➕ Send the numeric user ID to add as owner. (/cancel to abort)")
                    .await;
            }

            "/removeowner" => match arg.and_then(|a| a.parse::<i64>().ok()) {
                Some(id) => match self.store.remove_owner(UserId(id)) {
                    Ok(()) => self.reply(user, &format!("✅ Removed owner {id}")).await,
                    Err(e) => self.reply(user, &format!("❌ {e}")).await,
                },
                None => self.reply(user, "Usage: /removeowner <numeric id>").await,
            },

            "/setdelay" => {
                let current = self.store.delay_minutes();
                self.dialogs.start(user, OwnerDialog::SetDelay);
                self.reply(
                    user,
                    &format!(
                        "🕒 Current approval delay is {current} minutes.\n\
                         Send the new delay in minutes (0 for immediate approval, /cancel to abort)."
                    ),
                )
                .await;
            }

            "/broadcast" => {
                self.dialogs.start(user, OwnerDialog::Broadcast);
                self.reply(user, "📢 Send the text to broadcast. (/cancel to abort)")
                    .await;
            }

            "/cancel" => {
                self.dialogs.end(user);
                self.reply(user, "❌ Cancelled.").await;
            }

            _ => self.reply(user, "Unknown command. See /owner.").await,
        }
    }

    async fn advance_dialog(&mut self, user: UserId, dialog: &OwnerDialog, input: &str) {
        match owner::advance(dialog, input) {
            DialogAction::SetDelay(minutes) => {
                self.store.set_delay_minutes(minutes);
                self.dialogs.end(user);
                self.reply(user, &format!("✅ Approval delay set to {minutes} minutes."))
                    .await;
            }
            DialogAction::AddOwner(new_owner) => {
                self.dialogs.end(user);
                if self.store.add_owner(new_owner) {
                    self.reply(user, &format!("✅ Added owner {new_owner}")).await;
                } else {
                    self.reply(user, "Already an owner.").await;
                }
            }
            DialogAction::Broadcast(text) => {
                self.dialogs.end(user);
                let (sent, failed) = self.broadcast(&text).await;
                self.reply(user, &format!("✅ Broadcast done. Sent: {sent}, Failed: {failed}"))
                    .await;
            }
            DialogAction::ChannelDraft(draft) => {
                let detected = draft.describe().to_string();
                self.dialogs.set(user, OwnerDialog::AddChannelLabel { draft });
                self.reply(
                    user,
                    &format!(
                        "✅ Channel detected: {detected}\n\
                         Now send the button text to show to users \
                         (e.g. 🔗 Join Channel or 🚀 Join Updates)."
                    ),
                )
                .await;
            }
            DialogAction::ChannelComplete(channel) => {
                self.dialogs.end(user);
                let summary = format!(
                    "✅ Channel added!\n{}\nButton: {}",
                    channel.describe(),
                    channel.join_label()
                );
                self.store.add_channel(channel);
                self.reply(user, &summary).await;
            }
            DialogAction::Invalid(message) => self.reply(user, &message).await,
            DialogAction::Cancelled => {
                self.dialogs.end(user);
                self.reply(user, "❌ Cancelled.").await;
            }
        }
    }

    /// Fan a message out to the subscriber cache. Returns (sent, failed).
    async fn broadcast(&self, text: &str) -> (usize, usize) {
        let mut sent = 0;
        let mut failed = 0;
        for subscriber in self.store.subscribers() {
            match self.client.send_message(subscriber, text, None).await {
                Ok(_) => sent += 1,
                Err(e) => {
                    debug!(%subscriber, error = %e, "Broadcast delivery failed");
                    failed += 1;
                }
            }
        }
        (sent, failed)
    }

    async fn reply(&self, user: UserId, text: &str) {
        if let Err(e) = self.client.send_message(user, text, None).await {
            warn!(%user, error = %e, "Could not send reply");
        }
    }
}

fn owner_panel_text() -> String {
    "🔧 Owner Panel\n\n\
     /toggleforce — enable or disable force-join\n\
     /channels — list required channels\n\
     /addchannel — add a required channel\n\
     /removechannel <n> — remove a channel by position\n\
     /owners — list owners\n\
     /addowner — add an owner\n\
     /removeowner <id> — remove an owner\n\
     /setdelay — set the approval delay\n\
     /broadcast — message all subscribers\n\
     /cancel — abort the current dialog"
        .to_string()
}
