//! Persisted session snapshot
//!
//! Best-effort cache of the last known user. It may be stale relative to
//! the provider, and the force-logout signal overrides it whenever both
//! are present.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use macboard_storage::KeyValueStore;

use crate::user::User;
use crate::Result;

pub const SESSION_SNAPSHOT_KEY: &str = "mac_board_auth_state";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    pub user: Option<User>,
    pub is_logged_in: bool,
}

impl PersistedSnapshot {
    pub fn logged_in(user: User) -> Self {
        Self {
            user: Some(user),
            is_logged_in: true,
        }
    }

    /// The user, if the snapshot claims a logged-in session.
    pub fn into_user(self) -> Option<User> {
        if self.is_logged_in {
            self.user
        } else {
            None
        }
    }
}

#[derive(Clone)]
pub struct SnapshotStore {
    store: Arc<dyn KeyValueStore>,
}

impl SnapshotStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn read(&self) -> Result<Option<PersistedSnapshot>> {
        let Some(raw) = self.store.get(SESSION_SNAPSHOT_KEY)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Load the cached user. Unreadable or corrupt snapshots count as
    /// absent.
    pub fn load_user(&self) -> Option<User> {
        match self.read() {
            Ok(snapshot) => snapshot.and_then(PersistedSnapshot::into_user),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable session snapshot");
                None
            }
        }
    }

    pub fn save(&self, user: &User) -> Result<()> {
        let json = serde_json::to_string(&PersistedSnapshot::logged_in(user.clone()))?;
        self.store.set(SESSION_SNAPSHOT_KEY, &json)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(SESSION_SNAPSHOT_KEY)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use macboard_storage::MemoryStore;

    #[test]
    fn test_save_load_clear() {
        let snapshots = SnapshotStore::new(Arc::new(MemoryStore::new()));
        assert!(snapshots.load_user().is_none());

        let user = User::guest();
        snapshots.save(&user).unwrap();
        assert_eq!(snapshots.load_user(), Some(user));

        snapshots.clear().unwrap();
        assert!(snapshots.load_user().is_none());
        assert!(snapshots.read().unwrap().is_none());
    }

    #[test]
    fn test_logged_out_snapshot_has_no_user() {
        let store = MemoryStore::new();
        let snapshot = PersistedSnapshot {
            user: Some(User::guest()),
            is_logged_in: false,
        };
        store
            .set(SESSION_SNAPSHOT_KEY, &serde_json::to_string(&snapshot).unwrap())
            .unwrap();

        let snapshots = SnapshotStore::new(Arc::new(store));
        assert!(snapshots.load_user().is_none());
    }

    #[test]
    fn test_corrupt_snapshot_reads_as_absent() {
        let store = MemoryStore::new();
        store.set(SESSION_SNAPSHOT_KEY, "{not json").unwrap();

        let snapshots = SnapshotStore::new(Arc::new(store));
        assert!(snapshots.read().is_err());
        assert!(snapshots.load_user().is_none());
    }
}
