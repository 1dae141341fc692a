//! Verification prompt selection and message templates.
//!
//! Selection is pure: given the policy size and an evaluation, decide which
//! framing the requester sees. Rendering produces the text and the join/verify
//! keyboard. Templates for owner-facing notifications live here too, in one
//! place, so wording stays consistent across the engine.

use crate::chat::traits::{Button, ButtonAction, ChatId, Keyboard, UserId};
use crate::engine::evaluator::Evaluation;
use crate::engine::policy::{ChannelRef, MembershipPolicy};

/// Callback payload carried by the verify button.
pub const VERIFY_CALLBACK: &str = "verify";

/// Which message a requester (or operator) should see after evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// User has joined none of the required channels.
    FirstTime { missing: Vec<ChannelRef> },

    /// User has joined some channels; list only what is still missing.
    PartialProgress { missing: Vec<ChannelRef> },

    /// Policy could not be evaluated at all (no channel queryable).
    Diagnostic,
}

/// Select the prompt for an evaluation, or `None` when the policy is
/// satisfied and no message is needed.
pub fn select(total_channels: usize, eval: &Evaluation) -> Option<Prompt> {
    if !eval.missing.is_empty() {
        let joined = total_channels.saturating_sub(eval.missing.len());
        if joined == 0 {
            Some(Prompt::FirstTime {
                missing: eval.missing.clone(),
            })
        } else {
            Some(Prompt::PartialProgress {
                missing: eval.missing.clone(),
            })
        }
    } else if eval.check_failed {
        Some(Prompt::Diagnostic)
    } else {
        None
    }
}

/// Render a prompt into message text and an optional keyboard.
pub fn render(prompt: &Prompt, policy: &MembershipPolicy) -> (String, Option<Keyboard>) {
    match prompt {
        Prompt::FirstTime { missing } => (
            "🔒 Access Restricted\n\n\
             You need to join the required channels before being approved.\n\n\
             Tap each Join button below, join those channels, and then press \
             Verify to continue."
                .to_string(),
            Some(join_keyboard(missing, &policy.verify_label)),
        ),
        Prompt::PartialProgress { missing } => (
            "🔒 Access Restricted\n\n\
             You've joined some channels, but a few are still left.\n\n\
             Tap the Join buttons below for the remaining channels, then press \
             Verify once done."
                .to_string(),
            Some(join_keyboard(missing, &policy.verify_label)),
        ),
        Prompt::Diagnostic => (
            "⚠️ I couldn't verify memberships (bot may not have access). \
             Owner, please check bot permissions."
                .to_string(),
            None,
        ),
    }
}

/// Join buttons for the missing channels (policy order), then a full-width
/// verify button.
fn join_keyboard(missing: &[ChannelRef], verify_label: &str) -> Keyboard {
    let mut kb = Keyboard::default();
    for channel in missing {
        let button = match channel.join_url() {
            Some(url) => Button {
                label: channel.join_label().to_string(),
                action: ButtonAction::Url(url),
            },
            // No derivable URL: still show the entry so the user sees what is
            // required; pressing it yields an informational callback.
            None => Button {
                label: channel.join_label().to_string(),
                action: ButtonAction::Callback("no_invite".to_string()),
            },
        };
        kb.rows.push(vec![button]);
    }
    kb.rows.push(vec![Button {
        label: verify_label.to_string(),
        action: ButtonAction::Callback(VERIFY_CALLBACK.to_string()),
    }]);
    kb
}

// --- Message templates ---

pub fn msg_approved() -> String {
    "✅ You have been approved to the group!".to_string()
}

pub fn msg_verification_complete() -> String {
    "✅ Verification complete! Send a new join request and you'll be approved."
        .to_string()
}

pub fn msg_verification_passed() -> String {
    "✅ Verification passed. Access granted.".to_string()
}

pub fn msg_welcome() -> String {
    "👋 Hi! I gate join requests for this group.\n\
     Join the required channels and I'll approve you automatically."
        .to_string()
}

pub fn msg_policy_unconfigured() -> String {
    "⚠️ Force-join is enabled but no channels are configured. \
     Requests are being approved without checks. Configure channels via /owner."
        .to_string()
}

pub fn msg_approval_failure(group: ChatId, user: UserId, error: &str) -> String {
    format!(
        "❌ Approval failed\n\n\
         Could not approve user {user} in chat {group}:\n{error}\n\n\
         No retry will be made."
    )
}

pub fn msg_scheduling_failure(group: ChatId, user: UserId) -> String {
    format!(
        "❌ Scheduling failed\n\n\
         Could not schedule delayed approval for user {user} in chat {group}. \
         The request remains pending; no retry will be made."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(missing_ids: &[&str], check_failed: bool) -> Evaluation {
        Evaluation {
            missing: missing_ids.iter().map(|id| ChannelRef::from_input(id)).collect(),
            check_failed,
        }
    }

    #[test]
    fn test_first_time_framing_when_nothing_joined() {
        let prompt = select(2, &eval(&["@a", "@b"], false)).unwrap();
        assert!(matches!(prompt, Prompt::FirstTime { .. }));
    }

    #[test]
    fn test_partial_progress_framing() {
        let prompt = select(2, &eval(&["@b"], false)).unwrap();
        match prompt {
            Prompt::PartialProgress { missing } => {
                assert_eq!(missing.len(), 1);
                assert_eq!(missing[0].explicit_id.as_deref(), Some("@b"));
            }
            other => panic!("Expected partial progress, got {other:?}"),
        }
    }

    #[test]
    fn test_diagnostic_when_unevaluable() {
        let prompt = select(0, &eval(&[], true)).unwrap();
        assert_eq!(prompt, Prompt::Diagnostic);
    }

    #[test]
    fn test_no_prompt_when_satisfied() {
        assert_eq!(select(2, &eval(&[], false)), None);
    }

    #[test]
    fn test_keyboard_lists_missing_then_verify() {
        let policy = MembershipPolicy::default();
        let prompt = select(3, &eval(&["@a", "@b"], false)).unwrap();
        let (_, kb) = render(&prompt, &policy);
        let kb = kb.unwrap();

        assert_eq!(kb.rows.len(), 3);
        assert!(matches!(kb.rows[0][0].action, ButtonAction::Url(_)));
        assert_eq!(
            kb.rows[2][0].action,
            ButtonAction::Callback(VERIFY_CALLBACK.to_string())
        );
        assert_eq!(kb.rows[2][0].label, policy.verify_label);
    }

    #[test]
    fn test_diagnostic_has_no_keyboard() {
        let (text, kb) = render(&Prompt::Diagnostic, &MembershipPolicy::default());
        assert!(kb.is_none());
        assert!(text.contains("check bot permissions"));
    }
}
