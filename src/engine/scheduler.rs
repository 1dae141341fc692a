//! Approval execution, immediate or delayed.
//!
//! The scheduler reads the current delay setting at admit time. Zero means
//! approve synchronously; otherwise a ScheduledApproval is handed to a timer
//! task which sleeps and then approves. Execution is at-most-once per
//! registration and nothing is retried: approval failures are reported to
//! every owner, and the success notification to the user is best-effort.
//!
//! Scheduled approvals are in-memory only. A pending delayed approval is
//! lost on restart; the upstream join request stays pending, so the user
//! waits rather than being wrongly admitted.

use crate::chat::traits::{ChatClient, ChatId, UserId};
use crate::engine::prompt;
use crate::store::ConfigStore;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A registered delayed approval. Destroyed on execution; duplicates for the
/// same (group, user) pair fire independently.
#[derive(Debug)]
pub struct ScheduledApproval {
    pub group: ChatId,
    pub user: UserId,
    pub delay: Duration,
}

/// Executes approvals, honoring the configured delay.
#[derive(Clone)]
pub struct ApprovalScheduler<C: ChatClient> {
    client: C,
    store: ConfigStore,
    timer_tx: mpsc::UnboundedSender<ScheduledApproval>,
}

impl<C: ChatClient> ApprovalScheduler<C> {
    /// Create the scheduler and spawn its timer task.
    pub fn new(client: C, store: ConfigStore) -> Self {
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_timers(client.clone(), store.clone(), timer_rx));
        Self {
            client,
            store,
            timer_tx,
        }
    }

    /// Admit a user: approve now, or register a delayed approval.
    pub async fn admit(&self, group: ChatId, user: UserId) {
        let minutes = self.store.delay_minutes();
        if minutes == 0 {
            execute_approval(&self.client, &self.store, group, user).await;
            return;
        }

        let job = ScheduledApproval {
            group,
            user,
            delay: Duration::from_secs(minutes.saturating_mul(60)),
        };
        if self.timer_tx.send(job).is_err() {
            // Timer task is gone; surface to owners, do not retry.
            warn!(%group, %user, "Approval timer unavailable; scheduling failed");
            notify_owners(
                &self.client,
                &self.store,
                &prompt::msg_scheduling_failure(group, user),
            )
            .await;
        } else {
            info!(%group, %user, minutes, "Scheduled delayed approval");
        }
    }
}

/// Timer task: each registration gets its own sleep so one long delay never
/// holds up another.
async fn run_timers<C: ChatClient>(
    client: C,
    store: ConfigStore,
    mut rx: mpsc::UnboundedReceiver<ScheduledApproval>,
) {
    while let Some(job) = rx.recv().await {
        let client = client.clone();
        let store = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(job.delay).await;
            execute_approval(&client, &store, job.group, job.user).await;
        });
    }
}

/// Approve and report, identically for the immediate and delayed paths.
async fn execute_approval<C: ChatClient>(
    client: &C,
    store: &ConfigStore,
    group: ChatId,
    user: UserId,
) {
    match client.approve_join_request(group, user).await {
        Ok(()) => {
            info!(%group, %user, "Join request approved");
            // Best-effort: the approval already happened, a failed
            // notification must not surface anywhere.
            if let Err(e) = client.send_message(user, &prompt::msg_approved(), None).await {
                debug!(%user, error = %e, "Could not send approval notice");
            }
        }
        Err(e) => {
            warn!(%group, %user, error = %e, "Approval failed");
            notify_owners(
                client,
                store,
                &prompt::msg_approval_failure(group, user, &e.to_string()),
            )
            .await;
        }
    }
}

/// Fire-and-forget notification to every owner.
async fn notify_owners<C: ChatClient>(client: &C, store: &ConfigStore, text: &str) {
    for owner in store.owners() {
        if let Err(e) = client.send_message(owner, text, None).await {
            warn!(%owner, error = %e, "Could not notify owner");
        }
    }
}
