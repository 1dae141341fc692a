//! Integration tests for the end-to-end admission flow.
//!
//! Drives TurnstileBot through MockChatClient events:
//! 1. Join request arrives
//! 2. Policy evaluated (owner bypass / disabled / missing channels)
//! 3. Decline + prompt, or approval path
//! 4. Re-verification after joining
//! 5. Failure reporting to owners

use turnstile::bot::TurnstileBot;
use turnstile::chat::mock::MockChatClient;
use turnstile::chat::traits::{ChatEvent, ChatId, MemberStatus, MessageId, UserId};
use turnstile::engine::policy::ChannelRef;
use turnstile::store::ConfigStore;

const GROUP: ChatId = ChatId(-1001234);
const USER: UserId = UserId(7);
const OWNER: UserId = UserId(100);

fn setup(channels: &[&str], enabled: bool) -> (MockChatClient, TurnstileBot<MockChatClient>) {
    let client = MockChatClient::new();
    let store = ConfigStore::in_memory(OWNER);
    if enabled {
        store.toggle_policy();
    }
    for ch in channels {
        store.add_channel(ChannelRef::from_input(ch));
    }
    let bot = TurnstileBot::new(client.clone(), store);
    (client, bot)
}

fn join_request(user: UserId) -> ChatEvent {
    ChatEvent::JoinRequest { chat: GROUP, user }
}

fn verify(user: UserId) -> ChatEvent {
    ChatEvent::Callback {
        user,
        message: MessageId(0),
        data: "verify".to_string(),
    }
}

// Scenario A: policy [@a, @b], user member of @a only -> partial-progress
// prompt listing only @b.
#[tokio::test]
async fn partial_membership_gets_partial_progress_prompt() {
    let (client, mut bot) = setup(&["@a", "@b"], true);
    client.set_membership("@a", USER, MemberStatus::Member);

    bot.handle_event(join_request(USER)).await;

    assert!(client.approved().is_empty());
    assert_eq!(client.declined(), vec![(GROUP, USER)]);

    let sent = client.sent_to(USER);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("still left"), "partial-progress framing");

    // Keyboard: one join row (only @b) plus the verify row
    let kb = sent[0].keyboard.as_ref().unwrap();
    assert_eq!(kb.rows.len(), 2);
}

// Scenario B: policy disabled -> any non-owner request goes straight to the
// approval path.
#[tokio::test]
async fn disabled_policy_approves_without_checks() {
    let (client, mut bot) = setup(&["@a"], false);

    bot.handle_event(join_request(USER)).await;

    assert_eq!(client.approved(), vec![(GROUP, USER)]);
    assert!(client.declined().is_empty());
}

// Scenario D: approve call fails -> every owner gets exactly one failure
// notification, the requester gets nothing.
#[tokio::test]
async fn approval_failure_reported_to_owners_only() {
    let (client, mut bot) = setup(&[], false);
    client.fail_approvals(true);

    bot.handle_event(join_request(USER)).await;

    assert!(client.sent_to(USER).is_empty());
    let owner_msgs = client.sent_to(OWNER);
    assert_eq!(owner_msgs.len(), 1);
    assert!(owner_msgs[0].text.contains("Approval failed"));
    assert!(owner_msgs[0].text.contains(&USER.to_string()));
}

// Scenario E: declined request, then successful verification -> subscriber
// cached, success message sent, but no approve call (the engine never
// auto-resubmits a declined request).
#[tokio::test]
async fn successful_verification_does_not_resubmit() {
    let (client, mut bot) = setup(&["@a"], true);

    bot.handle_event(join_request(USER)).await;
    assert_eq!(client.declined(), vec![(GROUP, USER)]);
    client.clear_recorded();

    client.set_membership("@a", USER, MemberStatus::Member);
    bot.handle_event(verify(USER)).await;

    assert!(client.approved().is_empty());
    let sent = client.sent_to(USER);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("new join request"));

    // A fresh join request now passes
    bot.handle_event(join_request(USER)).await;
    assert_eq!(client.approved(), vec![(GROUP, USER)]);
}

#[tokio::test]
async fn owner_bypasses_policy_entirely() {
    let (client, mut bot) = setup(&["@a", "@b"], true);

    bot.handle_event(join_request(OWNER)).await;

    assert_eq!(client.approved(), vec![(GROUP, OWNER)]);
    assert!(client.declined().is_empty());
}

#[tokio::test]
async fn unresolvable_channel_blocks_admission() {
    let client = MockChatClient::new();
    let store = ConfigStore::in_memory(OWNER);
    store.toggle_policy();
    store.add_channel(ChannelRef {
        invite_link: Some("https://t.me/+PrivateHash".to_string()),
        ..ChannelRef::default()
    });
    let mut bot = TurnstileBot::new(client.clone(), store);

    bot.handle_event(join_request(USER)).await;

    assert!(client.approved().is_empty());
    assert_eq!(client.declined(), vec![(GROUP, USER)]);
}

#[tokio::test]
async fn repeated_failed_verification_replaces_prompt() {
    let (client, mut bot) = setup(&["@a", "@b"], true);
    client.set_membership("@a", USER, MemberStatus::Member);

    bot.handle_event(join_request(USER)).await;
    let first_prompt = client.sent_to(USER);
    assert_eq!(first_prompt.len(), 1);

    // Still missing @b: stale prompt deleted, new one sent
    bot.handle_event(verify(USER)).await;

    assert_eq!(client.deleted().len(), 1);
    assert_eq!(client.sent_to(USER).len(), 2);
    // Still no approval, still declined only once
    assert!(client.approved().is_empty());
    assert_eq!(client.declined().len(), 1);
}

#[tokio::test]
async fn broken_channel_fails_closed() {
    let (client, mut bot) = setup(&["@a"], true);
    client.break_channel("@a");

    bot.handle_event(join_request(USER)).await;

    assert!(client.approved().is_empty());
    assert_eq!(client.declined(), vec![(GROUP, USER)]);
}

#[tokio::test]
async fn enabled_policy_with_no_channels_warns_owners_and_approves() {
    let (client, mut bot) = setup(&[], true);

    bot.handle_event(join_request(USER)).await;

    assert_eq!(client.approved(), vec![(GROUP, USER)]);
    let owner_msgs = client.sent_to(OWNER);
    assert_eq!(owner_msgs.len(), 1);
    assert!(owner_msgs[0].text.contains("no channels"));
}
