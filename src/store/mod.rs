//! Bot state store.
//!
//! Holds the membership policy, owner set, subscriber cache and approval
//! delay behind a single mutex. Every mutation is one atomic per-key
//! operation under that lock — callers never read the whole state, modify it
//! and write it back, so interleaved handlers cannot lose updates.
//!
//! State is persisted as a JSON flat file. Missing or malformed fields are
//! normalized to defaults at load time and never treated as fatal.

use crate::chat::traits::UserId;
use crate::engine::policy::{ChannelRef, MembershipPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

/// Persisted bot state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BotState {
    #[serde(default)]
    policy: MembershipPolicy,

    #[serde(default)]
    owners: BTreeSet<UserId>,

    #[serde(default)]
    subscribers: BTreeSet<UserId>,

    /// Approval delay in minutes; 0 = immediate.
    #[serde(default)]
    approval_delay_minutes: u64,
}

struct Inner {
    state: BotState,
    path: Option<PathBuf>,
}

/// Shared handle to the bot state.
#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<Mutex<Inner>>,
}

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("At least one owner must remain")]
    LastOwner,

    #[error("Not an owner: {0}")]
    UnknownOwner(UserId),

    #[error("No channel at position {0}")]
    UnknownChannel(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigStore {
    /// Open (or create) the state file at `path`.
    ///
    /// A malformed file is logged and replaced with defaults rather than
    /// aborting startup. `initial_owner` is inserted if the owner set is
    /// empty, preserving the never-empty invariant.
    pub fn open(path: &Path, initial_owner: UserId) -> Result<Self, StoreError> {
        let state = match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<BotState>(&contents) {
                Ok(state) => state,
                Err(e) => {
                    warn!("State file '{}' is malformed ({e}); starting from defaults", path.display());
                    BotState::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BotState::default(),
            Err(e) => return Err(e.into()),
        };

        let store = Self {
            inner: Arc::new(Mutex::new(Inner {
                state,
                path: Some(path.to_path_buf()),
            })),
        };
        store.with_mut(|state| {
            if state.owners.is_empty() {
                state.owners.insert(initial_owner);
            }
        });
        Ok(store)
    }

    /// In-memory store for tests.
    pub fn in_memory(initial_owner: UserId) -> Self {
        let mut state = BotState::default();
        state.owners.insert(initial_owner);
        Self {
            inner: Arc::new(Mutex::new(Inner { state, path: None })),
        }
    }

    /// Run one mutation under the lock and persist the result.
    fn with_mut<T>(&self, f: impl FnOnce(&mut BotState) -> T) -> T {
        let mut inner = self.inner.lock().unwrap();
        let result = f(&mut inner.state);
        if let Some(path) = inner.path.clone() {
            if let Err(e) = persist(&inner.state, &path) {
                warn!("Failed to persist state to '{}': {e}", path.display());
            }
        }
        result
    }

    fn read<T>(&self, f: impl FnOnce(&BotState) -> T) -> T {
        let inner = self.inner.lock().unwrap();
        f(&inner.state)
    }

    // --- Policy ---

    pub fn policy(&self) -> MembershipPolicy {
        self.read(|s| s.policy.clone())
    }

    /// Toggle force-join; returns the new enabled state.
    pub fn toggle_policy(&self) -> bool {
        self.with_mut(|s| {
            s.policy.enabled = !s.policy.enabled;
            s.policy.enabled
        })
    }

    pub fn add_channel(&self, channel: ChannelRef) {
        self.with_mut(|s| s.policy.channels.push(channel));
    }

    /// Remove the channel at `index` (0-based, policy order).
    pub fn remove_channel(&self, index: usize) -> Result<ChannelRef, StoreError> {
        self.with_mut(|s| {
            if index < s.policy.channels.len() {
                Ok(s.policy.channels.remove(index))
            } else {
                Err(StoreError::UnknownChannel(index))
            }
        })
    }

    // --- Owners ---

    pub fn is_owner(&self, user: UserId) -> bool {
        self.read(|s| s.owners.contains(&user))
    }

    pub fn owners(&self) -> Vec<UserId> {
        self.read(|s| s.owners.iter().copied().collect())
    }

    /// Returns false if the user was already an owner.
    pub fn add_owner(&self, user: UserId) -> bool {
        self.with_mut(|s| s.owners.insert(user))
    }

    /// Remove an owner, refusing to empty the set.
    pub fn remove_owner(&self, user: UserId) -> Result<(), StoreError> {
        self.with_mut(|s| {
            if !s.owners.contains(&user) {
                return Err(StoreError::UnknownOwner(user));
            }
            if s.owners.len() <= 1 {
                return Err(StoreError::LastOwner);
            }
            s.owners.remove(&user);
            Ok(())
        })
    }

    // --- Subscribers ---

    pub fn subscribers(&self) -> Vec<UserId> {
        self.read(|s| s.subscribers.iter().copied().collect())
    }

    /// Returns true if the user was newly inserted.
    pub fn insert_subscriber(&self, user: UserId) -> bool {
        self.with_mut(|s| s.subscribers.insert(user))
    }

    /// Returns true if the user was present.
    pub fn remove_subscriber(&self, user: UserId) -> bool {
        self.with_mut(|s| s.subscribers.remove(&user))
    }

    // --- Approval delay ---

    pub fn delay_minutes(&self) -> u64 {
        self.read(|s| s.approval_delay_minutes)
    }

    pub fn approval_delay(&self) -> Duration {
        Duration::from_secs(self.delay_minutes().saturating_mul(60))
    }

    pub fn set_delay_minutes(&self, minutes: u64) {
        self.with_mut(|s| s.approval_delay_minutes = minutes);
    }
}

fn persist(state: &BotState, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(state)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const OWNER: UserId = UserId(100);

    #[test]
    fn test_initial_owner_seeded() {
        let store = ConfigStore::in_memory(OWNER);
        assert!(store.is_owner(OWNER));
        assert_eq!(store.owners(), vec![OWNER]);
    }

    #[test]
    fn test_last_owner_cannot_be_removed() {
        let store = ConfigStore::in_memory(OWNER);
        assert!(matches!(store.remove_owner(OWNER), Err(StoreError::LastOwner)));

        store.add_owner(UserId(200));
        store.remove_owner(OWNER).unwrap();
        assert_eq!(store.owners(), vec![UserId(200)]);
    }

    #[test]
    fn test_remove_unknown_owner() {
        let store = ConfigStore::in_memory(OWNER);
        assert!(matches!(
            store.remove_owner(UserId(999)),
            Err(StoreError::UnknownOwner(UserId(999)))
        ));
    }

    #[test]
    fn test_subscriber_cache_operations() {
        let store = ConfigStore::in_memory(OWNER);
        assert!(store.insert_subscriber(UserId(1)));
        assert!(!store.insert_subscriber(UserId(1)));
        assert!(store.remove_subscriber(UserId(1)));
        assert!(!store.remove_subscriber(UserId(1)));
    }

    #[test]
    fn test_channel_crud_preserves_order() {
        let store = ConfigStore::in_memory(OWNER);
        store.add_channel(ChannelRef::from_input("@a"));
        store.add_channel(ChannelRef::from_input("@b"));
        store.add_channel(ChannelRef::from_input("@c"));

        let removed = store.remove_channel(1).unwrap();
        assert_eq!(removed.explicit_id.as_deref(), Some("@b"));

        let policy = store.policy();
        let ids: Vec<_> = policy
            .channels
            .iter()
            .map(|c| c.explicit_id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["@a", "@c"]);

        assert!(matches!(store.remove_channel(5), Err(StoreError::UnknownChannel(5))));
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        let store = ConfigStore::open(&path, OWNER).unwrap();
        store.add_channel(ChannelRef::from_input("@a"));
        store.toggle_policy();
        store.set_delay_minutes(5);
        store.insert_subscriber(UserId(7));
        drop(store);

        let reopened = ConfigStore::open(&path, OWNER).unwrap();
        assert!(reopened.policy().enabled);
        assert_eq!(reopened.policy().channels.len(), 1);
        assert_eq!(reopened.delay_minutes(), 5);
        assert_eq!(reopened.subscribers(), vec![UserId(7)]);
    }

    #[test]
    fn test_malformed_state_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not valid json").unwrap();

        let store = ConfigStore::open(&path, OWNER).unwrap();
        assert!(store.is_owner(OWNER));
        assert!(!store.policy().enabled);
        assert_eq!(store.delay_minutes(), 0);
    }

    #[test]
    fn test_huge_delay_saturates_instead_of_overflowing() {
        let store = ConfigStore::in_memory(OWNER);
        store.set_delay_minutes(u64::MAX);
        assert_eq!(store.approval_delay(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_partial_state_file_normalized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"owners": [42]}"#).unwrap();

        let store = ConfigStore::open(&path, OWNER).unwrap();
        // Existing owners kept, initial owner not re-seeded
        assert_eq!(store.owners(), vec![UserId(42)]);
        assert!(store.subscribers().is_empty());
        assert!(!store.policy().enabled);
    }
}
