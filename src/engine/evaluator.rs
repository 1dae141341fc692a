//! Membership evaluation.
//!
//! Determines which policy channels a user has not satisfied. Evaluation is
//! fail-closed: a channel that cannot be resolved or whose membership query
//! errors counts as missing, and no single channel's failure aborts the
//! loop. The function is side-effect-free, so identical external state
//! yields identical ordered results.

use crate::chat::traits::{ChatClient, UserId};
use crate::engine::policy::{ChannelRef, MembershipPolicy};
use tracing::{debug, warn};

/// Outcome of evaluating one user against the policy.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Unsatisfied channels, in policy order.
    pub missing: Vec<ChannelRef>,

    /// True only when no channel was resolvable enough to attempt any query:
    /// the bot's verification capability is broken, as opposed to the user
    /// not having joined.
    pub check_failed: bool,
}

impl Evaluation {
    pub fn satisfied(&self) -> bool {
        self.missing.is_empty() && !self.check_failed
    }
}

/// Evaluate `user` against `policy.channels`, in order.
pub async fn evaluate<C: ChatClient>(
    client: &C,
    policy: &MembershipPolicy,
    user: UserId,
) -> Evaluation {
    // An empty policy is vacuously satisfied.
    if policy.channels.is_empty() {
        return Evaluation {
            missing: Vec::new(),
            check_failed: false,
        };
    }

    let mut missing = Vec::new();
    let mut any_attempted = false;

    for channel in &policy.channels {
        let Some(identity) = channel.query_identity() else {
            // No queryable identity: cannot verify, so unsatisfied.
            debug!(channel = channel.describe(), "Channel has no queryable identity; treating as missing");
            missing.push(channel.clone());
            continue;
        };

        any_attempted = true;
        match client.query_membership(&identity, user).await {
            Ok(status) if status.is_current_member() => {
                debug!(%identity, %user, "Membership satisfied");
            }
            Ok(status) => {
                debug!(%identity, %user, ?status, "User not a member");
                missing.push(channel.clone());
            }
            Err(e) => {
                // Query errors and not-a-member both fold into missing, but
                // a query error points at bot access problems, so log louder.
                warn!(%identity, %user, error = %e, "Membership query failed; treating as missing");
                missing.push(channel.clone());
            }
        }
    }

    Evaluation {
        missing,
        check_failed: !any_attempted,
    }
}
