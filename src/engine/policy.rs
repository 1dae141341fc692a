//! Membership policy data model.
//!
//! A policy is an ordered list of channel references a requester must belong
//! to before admission. Order matters: it is both evaluation priority and
//! display order, and every derived missing-list preserves it.

use serde::{Deserialize, Serialize};

const DEFAULT_VERIFY_LABEL: &str = "✅ Verify";
const DEFAULT_JOIN_LABEL: &str = "🔗 Join Channel";

/// Force-join membership policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipPolicy {
    #[serde(default)]
    pub enabled: bool,

    /// Required channels, in priority/display order.
    #[serde(default)]
    pub channels: Vec<ChannelRef>,

    /// Label for the re-verification button.
    #[serde(default = "default_verify_label")]
    pub verify_label: String,
}

fn default_verify_label() -> String {
    DEFAULT_VERIFY_LABEL.to_string()
}

impl Default for MembershipPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            channels: Vec::new(),
            verify_label: default_verify_label(),
        }
    }
}

/// One required channel.
///
/// At least one of `explicit_id` / `invite_link` must be present for the
/// channel to be queryable; a ref with neither is permanently unsatisfied
/// (fail-closed).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelRef {
    /// `@username` or numeric chat id, queryable directly.
    #[serde(default)]
    pub explicit_id: Option<String>,

    /// Invite URL; a public `t.me/<name>` link yields a queryable identity,
    /// a private invite hash does not.
    #[serde(default)]
    pub invite_link: Option<String>,

    /// Custom join-button label.
    #[serde(default)]
    pub join_label: Option<String>,
}

impl ChannelRef {
    /// Build a ref from owner input: URLs become invite links, anything else
    /// is taken as an explicit chat identity.
    pub fn from_input(text: &str) -> Self {
        let text = text.trim();
        if text.starts_with("http://") || text.starts_with("https://") {
            Self {
                invite_link: Some(text.to_string()),
                ..Self::default()
            }
        } else {
            Self {
                explicit_id: Some(text.to_string()),
                ..Self::default()
            }
        }
    }

    /// Derive a queryable chat identity, if any.
    ///
    /// Prefers the explicit id. Otherwise takes the first path segment of a
    /// public `t.me/<name>` invite link; private-invite links (`joinchat/…`,
    /// `+…`) cannot be resolved to a queryable username and yield `None`.
    pub fn query_identity(&self) -> Option<String> {
        if let Some(id) = self.explicit_id.as_deref().filter(|s| !s.is_empty()) {
            return Some(id.to_string());
        }

        let invite = self.invite_link.as_deref().filter(|s| !s.is_empty())?;
        let path = invite.split("t.me/").nth(1)?;
        let segment = path.split('/').find(|s| !s.is_empty())?;
        if segment.to_lowercase().starts_with("joinchat") || segment.starts_with('+') {
            return None;
        }
        if segment.starts_with('@') {
            Some(segment.to_string())
        } else {
            Some(format!("@{segment}"))
        }
    }

    /// URL for the join button, if one can be derived.
    pub fn join_url(&self) -> Option<String> {
        if let Some(invite) = self.invite_link.as_deref().filter(|s| !s.is_empty()) {
            return Some(invite.to_string());
        }
        let id = self.explicit_id.as_deref().filter(|s| s.starts_with('@'))?;
        Some(format!("https://t.me/{}", id.trim_start_matches('@')))
    }

    /// Label shown on the join button.
    pub fn join_label(&self) -> &str {
        self.join_label
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_JOIN_LABEL)
    }

    /// Human-readable identity for owner-facing listings.
    pub fn describe(&self) -> &str {
        self.explicit_id
            .as_deref()
            .or(self.invite_link.as_deref())
            .filter(|s| !s.is_empty())
            .unwrap_or("(unconfigured)")
    }
}
