//! Owner dialog flows.
//!
//! Multi-step owner interactions (set delay, add owner, add channel,
//! broadcast) are modelled as a typed per-user state machine instead of
//! string-tagged flow flags. `advance` is pure: it maps the current dialog
//! state and one line of input to a `DialogAction`; the bot loop executes
//! the action against the store and the chat client.

use crate::chat::traits::UserId;
use crate::engine::policy::ChannelRef;
use std::collections::HashMap;

/// Cancel keyword accepted in any dialog.
pub const CANCEL: &str = "/cancel";

/// Maximum length of a join-button label.
const MAX_LABEL_LEN: usize = 40;

/// Active dialog state for one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerDialog {
    /// Waiting for a delay in minutes.
    SetDelay,

    /// Waiting for a numeric user id to add as owner.
    AddOwner,

    /// Waiting for the broadcast text.
    Broadcast,

    /// Add channel, step 1: waiting for an identifier or invite link.
    AddChannelIdentifier,

    /// Add channel, step 2: waiting for the join-button label.
    AddChannelLabel { draft: ChannelRef },
}

/// What the bot should do with one line of dialog input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogAction {
    /// Persist the new delay (minutes) and end the dialog.
    SetDelay(u64),

    /// Add this owner and end the dialog.
    AddOwner(UserId),

    /// Fan this text out to subscribers and end the dialog.
    Broadcast(String),

    /// Channel identifier accepted; move to the label step.
    ChannelDraft(ChannelRef),

    /// Channel complete; persist it and end the dialog.
    ChannelComplete(ChannelRef),

    /// Input rejected; show this message and stay in the dialog.
    Invalid(String),

    /// Dialog cancelled.
    Cancelled,
}

/// Advance a dialog with one line of owner input.
pub fn advance(dialog: &OwnerDialog, input: &str) -> DialogAction {
    let input = input.trim();
    if input == CANCEL {
        return DialogAction::Cancelled;
    }

    match dialog {
        OwnerDialog::SetDelay => match input.parse::<i64>() {
            Ok(minutes) if minutes >= 0 => DialogAction::SetDelay(minutes as u64),
            Ok(_) => DialogAction::Invalid(
                "❌ Please send a non-negative number (0 or more).".to_string(),
            ),
            Err(_) => DialogAction::Invalid(
                "❌ Invalid input. Please send a numeric value for minutes.".to_string(),
            ),
        },

        OwnerDialog::AddOwner => match input.parse::<i64>() {
            Ok(id) => DialogAction::AddOwner(UserId(id)),
            Err(_) => DialogAction::Invalid("❌ Please send a numeric user ID.".to_string()),
        },

        OwnerDialog::Broadcast => {
            if input.is_empty() {
                DialogAction::Invalid("❌ Broadcast text cannot be empty.".to_string())
            } else {
                DialogAction::Broadcast(input.to_string())
            }
        }

        OwnerDialog::AddChannelIdentifier => {
            if input.is_empty() {
                DialogAction::Invalid(
                    "❌ Send a channel identifier (@name, chat id) or invite link.".to_string(),
                )
            } else {
                DialogAction::ChannelDraft(ChannelRef::from_input(input))
            }
        }

        OwnerDialog::AddChannelLabel { draft } => {
            if input.is_empty() || input.chars().count() > MAX_LABEL_LEN {
                DialogAction::Invalid(format!(
                    "❌ Button text must be 1-{MAX_LABEL_LEN} characters. Send shorter text."
                ))
            } else {
                let mut channel = draft.clone();
                channel.join_label = Some(input.to_string());
                DialogAction::ChannelComplete(channel)
            }
        }
    }
}

/// Per-owner dialog tracker.
#[derive(Debug, Default)]
pub struct OwnerDialogs {
    active: HashMap<UserId, OwnerDialog>,
}

impl OwnerDialogs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, owner: UserId, dialog: OwnerDialog) {
        self.active.insert(owner, dialog);
    }

    pub fn current(&self, owner: UserId) -> Option<&OwnerDialog> {
        self.active.get(&owner)
    }

    pub fn set(&mut self, owner: UserId, dialog: OwnerDialog) {
        self.active.insert(owner, dialog);
    }

    pub fn end(&mut self, owner: UserId) {
        self.active.remove(&owner);
    }
}
