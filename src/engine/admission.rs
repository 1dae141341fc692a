//! Admission decision engine.
//!
//! Drives a join request through the policy gate:
//!
//! - owners bypass the policy (but still honor the approval delay)
//! - a disabled or empty policy approves immediately
//! - an unsatisfied policy declines the request FIRST, then prompts the
//!   requester to join the missing channels and press Verify
//!
//! The decline-before-prompt ordering is a correctness requirement: an
//! approved admission cannot be retracted, so the engine never approves
//! speculatively and never prompts while the original request could still be
//! acted on.

use crate::chat::traits::{ChatClient, ChatId, UserId};
use crate::engine::evaluator::{self, Evaluation};
use crate::engine::prompt::{self, Prompt};
use crate::engine::scheduler::ApprovalScheduler;
use crate::engine::session::SessionTracker;
use crate::store::ConfigStore;
use tracing::{debug, info, warn};

/// Where a join request ended up. Returned for logging and tests; the
/// side effects (decline, prompt, approval) have already been issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// Routed to the approval path (immediate or delayed per DelayConfig).
    ApprovalPath,

    /// Declined; requester prompted and awaiting re-verification.
    AwaitingVerification,
}

/// Outcome of a user-initiated re-verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Policy satisfied; user confirmed and must send a fresh join request.
    Verified,

    /// Still missing channels; re-prompted.
    StillMissing,
}

/// Per-request admission control flow.
pub struct AdmissionEngine<C: ChatClient> {
    client: C,
    store: ConfigStore,
    scheduler: ApprovalScheduler<C>,
    sessions: SessionTracker,
}

impl<C: ChatClient> AdmissionEngine<C> {
    pub fn new(client: C, store: ConfigStore, scheduler: ApprovalScheduler<C>) -> Self {
        Self {
            client,
            store,
            scheduler,
            sessions: SessionTracker::new(),
        }
    }

    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    /// Handle an inbound join request.
    pub async fn handle_join_request(&mut self, group: ChatId, user: UserId) -> AdmissionOutcome {
        // 1. Owner bypass (delay still applies).
        if self.store.is_owner(user) {
            debug!(%user, "Owner bypass");
            self.scheduler.admit(group, user).await;
            return AdmissionOutcome::ApprovalPath;
        }

        let policy = self.store.policy();

        // 2. Disabled, or enabled with nothing configured.
        if !policy.enabled {
            self.scheduler.admit(group, user).await;
            return AdmissionOutcome::ApprovalPath;
        }
        if policy.channels.is_empty() {
            // Misconfiguration, not an engine failure: warn the owners and
            // let the request through.
            warn!("Force-join enabled with no channels configured");
            self.warn_owners(&prompt::msg_policy_unconfigured()).await;
            self.scheduler.admit(group, user).await;
            return AdmissionOutcome::ApprovalPath;
        }

        // 3. Evaluate the policy.
        let eval = evaluator::evaluate(&self.client, &policy, user).await;
        if eval.missing.is_empty() && !eval.check_failed {
            self.store.insert_subscriber(user);
            self.scheduler.admit(group, user).await;
            return AdmissionOutcome::ApprovalPath;
        }

        // Unsatisfied: decline before anything else — the upstream approve is
        // terminal, so the request must be closed out before we prompt.
        if let Err(e) = self.client.decline_join_request(group, user).await {
            warn!(%group, %user, error = %e, "Could not decline join request");
        }
        self.store.remove_subscriber(user);

        let prompt_id = self.send_prompt(user, &policy, &eval).await;
        self.sessions.begin(user, prompt_id);
        info!(%group, %user, missing = eval.missing.len(), "Join request declined pending verification");
        AdmissionOutcome::AwaitingVerification
    }

    /// Handle a verify-button press.
    pub async fn handle_verification(&mut self, user: UserId) -> VerifyOutcome {
        let policy = self.store.policy();

        // Owners and a disabled policy have nothing to verify.
        if self.store.is_owner(user) || !policy.enabled {
            self.send_best_effort(user, &prompt::msg_verification_passed(), None)
                .await;
            return VerifyOutcome::Verified;
        }

        let eval = evaluator::evaluate(&self.client, &policy, user).await;
        if eval.missing.is_empty() && !eval.check_failed {
            // Satisfied. The prior request stays declined; the user sends a
            // fresh one which will now pass.
            self.store.insert_subscriber(user);
            self.sessions.complete(user);
            self.send_best_effort(user, &prompt::msg_verification_complete(), None)
                .await;
            info!(%user, "Verification passed");
            return VerifyOutcome::Verified;
        }

        // Still unsatisfied: drop the stale prompt and re-prompt for the
        // current missing set.
        self.store.remove_subscriber(user);
        if let Some(previous) = self.sessions.prompt_message(user) {
            if let Err(e) = self.client.delete_message(user, previous).await {
                debug!(%user, error = %e, "Could not delete previous prompt");
            }
        }
        let prompt_id = self.send_prompt(user, &policy, &eval).await;
        self.sessions.begin(user, prompt_id);
        VerifyOutcome::StillMissing
    }

    /// Handle `/start` in the bot's private chat.
    ///
    /// Verified users and owners are cached as subscribers and greeted;
    /// anyone else under an enabled policy gets the verification prompt.
    pub async fn handle_start(&mut self, user: UserId) {
        let policy = self.store.policy();

        if !self.store.is_owner(user) && policy.enabled {
            if policy.channels.is_empty() {
                self.send_best_effort(user, &prompt::msg_policy_unconfigured(), None)
                    .await;
                return;
            }
            let eval = evaluator::evaluate(&self.client, &policy, user).await;
            if !eval.missing.is_empty() || eval.check_failed {
                self.store.remove_subscriber(user);
                let prompt_id = self.send_prompt(user, &policy, &eval).await;
                self.sessions.begin(user, prompt_id);
                return;
            }
        }

        self.store.insert_subscriber(user);
        self.send_best_effort(user, &prompt::msg_welcome(), None).await;
    }

    /// Select, render and send the prompt for an evaluation. Returns the
    /// message id when the send succeeded and a user prompt was shown.
    async fn send_prompt(
        &self,
        user: UserId,
        policy: &crate::engine::policy::MembershipPolicy,
        eval: &Evaluation,
    ) -> Option<crate::chat::traits::MessageId> {
        let selected = prompt::select(policy.channels.len(), eval)?;
        if selected == Prompt::Diagnostic {
            warn!(%user, "Policy unevaluable; sending diagnostic");
        }
        let (text, keyboard) = prompt::render(&selected, policy);
        match self.client.send_message(user, &text, keyboard.as_ref()).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(%user, error = %e, "Could not send verification prompt");
                None
            }
        }
    }

    async fn send_best_effort(
        &self,
        user: UserId,
        text: &str,
        keyboard: Option<&crate::chat::traits::Keyboard>,
    ) {
        if let Err(e) = self.client.send_message(user, text, keyboard).await {
            debug!(%user, error = %e, "Could not send message");
        }
    }

    async fn warn_owners(&self, text: &str) {
        for owner in self.store.owners() {
            self.send_best_effort(owner, text, None).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::mock::MockChatClient;
    use crate::chat::traits::MemberStatus;
    use crate::engine::policy::ChannelRef;

    const GROUP: ChatId = ChatId(-100);
    const USER: UserId = UserId(7);
    const OWNER: UserId = UserId(100);

    fn engine_with_policy(
        client: &MockChatClient,
        channels: &[&str],
        enabled: bool,
    ) -> AdmissionEngine<MockChatClient> {
        let store = ConfigStore::in_memory(OWNER);
        if enabled {
            store.toggle_policy();
        }
        for ch in channels {
            store.add_channel(ChannelRef::from_input(ch));
        }
        let scheduler = ApprovalScheduler::new(client.clone(), store.clone());
        AdmissionEngine::new(client.clone(), store, scheduler)
    }

    #[tokio::test]
    async fn test_policy_disabled_goes_to_approval_path() {
        let client = MockChatClient::new();
        let mut engine = engine_with_policy(&client, &["@a"], false);

        let outcome = engine.handle_join_request(GROUP, USER).await;
        assert_eq!(outcome, AdmissionOutcome::ApprovalPath);
        assert_eq!(client.approved(), vec![(GROUP, USER)]);
        assert!(client.declined().is_empty());
    }

    #[tokio::test]
    async fn test_owner_bypasses_policy() {
        let client = MockChatClient::new();
        let mut engine = engine_with_policy(&client, &["@a"], true);

        let outcome = engine.handle_join_request(GROUP, OWNER).await;
        assert_eq!(outcome, AdmissionOutcome::ApprovalPath);
        assert_eq!(client.approved(), vec![(GROUP, OWNER)]);
    }

    #[tokio::test]
    async fn test_enabled_empty_policy_approves_and_warns_owners() {
        let client = MockChatClient::new();
        let mut engine = engine_with_policy(&client, &[], true);

        let outcome = engine.handle_join_request(GROUP, USER).await;
        assert_eq!(outcome, AdmissionOutcome::ApprovalPath);
        assert_eq!(client.approved(), vec![(GROUP, USER)]);

        let owner_msgs = client.sent_to(OWNER);
        assert_eq!(owner_msgs.len(), 1);
        assert!(owner_msgs[0].text.contains("no channels"));
    }

    #[tokio::test]
    async fn test_satisfied_policy_approves_and_caches_subscriber() {
        let client = MockChatClient::new();
        client.set_membership("@a", USER, MemberStatus::Member);
        let mut engine = engine_with_policy(&client, &["@a"], true);

        let outcome = engine.handle_join_request(GROUP, USER).await;
        assert_eq!(outcome, AdmissionOutcome::ApprovalPath);
        assert_eq!(client.approved(), vec![(GROUP, USER)]);
    }

    #[tokio::test]
    async fn test_unsatisfied_policy_declines_before_prompt() {
        let client = MockChatClient::new();
        let mut engine = engine_with_policy(&client, &["@a", "@b"], true);

        let outcome = engine.handle_join_request(GROUP, USER).await;
        assert_eq!(outcome, AdmissionOutcome::AwaitingVerification);
        assert!(client.approved().is_empty());
        assert_eq!(client.declined(), vec![(GROUP, USER)]);
        assert!(engine.sessions().is_awaiting(USER));

        let sent = client.sent_to(USER);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].keyboard.is_some());
    }

    #[tokio::test]
    async fn test_partial_progress_prompt_lists_only_missing() {
        let client = MockChatClient::new();
        client.set_membership("@a", USER, MemberStatus::Member);
        let mut engine = engine_with_policy(&client, &["@a", "@b"], true);

        engine.handle_join_request(GROUP, USER).await;
        let sent = client.sent_to(USER);
        assert!(sent[0].text.contains("still left"));
        // Keyboard: one join row for @b plus the verify row
        assert_eq!(sent[0].keyboard.as_ref().unwrap().rows.len(), 2);
    }

    #[tokio::test]
    async fn test_verification_success_does_not_approve() {
        let client = MockChatClient::new();
        let mut engine = engine_with_policy(&client, &["@a"], true);

        // Declined first
        engine.handle_join_request(GROUP, USER).await;
        client.clear_recorded();

        // User joins, then verifies
        client.set_membership("@a", USER, MemberStatus::Member);
        let outcome = engine.handle_verification(USER).await;
        assert_eq!(outcome, VerifyOutcome::Verified);

        // No approve call: the declined request is gone, a fresh one is needed
        assert!(client.approved().is_empty());
        assert!(!engine.sessions().is_awaiting(USER));
        let sent = client.sent_to(USER);
        assert!(sent[0].text.contains("new join request"));
    }

    #[tokio::test]
    async fn test_failed_reverify_deletes_stale_prompt_and_reprompts() {
        let client = MockChatClient::new();
        client.set_membership("@a", USER, MemberStatus::Member);
        let mut engine = engine_with_policy(&client, &["@a", "@b"], true);

        engine.handle_join_request(GROUP, USER).await;
        let first_prompt = engine.sessions().prompt_message(USER).unwrap();

        let outcome = engine.handle_verification(USER).await;
        assert_eq!(outcome, VerifyOutcome::StillMissing);
        assert_eq!(client.deleted(), vec![(USER, first_prompt)]);

        // Session now tracks the replacement prompt
        let second_prompt = engine.sessions().prompt_message(USER).unwrap();
        assert_ne!(first_prompt, second_prompt);
    }

    #[tokio::test]
    async fn test_owner_verification_short_circuits() {
        let client = MockChatClient::new();
        let mut engine = engine_with_policy(&client, &["@a"], true);

        let outcome = engine.handle_verification(OWNER).await;
        assert_eq!(outcome, VerifyOutcome::Verified);
        let sent = client.sent_to(OWNER);
        assert!(sent[0].text.contains("Verification passed"));
    }

    #[tokio::test]
    async fn test_start_prompts_unverified_user() {
        let client = MockChatClient::new();
        let mut engine = engine_with_policy(&client, &["@a"], true);

        engine.handle_start(USER).await;
        assert!(engine.sessions().is_awaiting(USER));
        let sent = client.sent_to(USER);
        assert!(sent[0].text.contains("Access Restricted"));
    }

    #[tokio::test]
    async fn test_start_welcomes_verified_user() {
        let client = MockChatClient::new();
        client.set_membership("@a", USER, MemberStatus::Member);
        let mut engine = engine_with_policy(&client, &["@a"], true);

        engine.handle_start(USER).await;
        assert!(!engine.sessions().is_awaiting(USER));
        let sent = client.sent_to(USER);
        assert!(sent[0].text.contains("Hi!"));
    }
}
