//! Per-(voter, target) guards around the read-decide-write of a vote.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockKey = (String, String);

/// Keyed locks serializing vote commands for the same voter and target.
///
/// Commands on different keys never wait on each other. An entry is dropped
/// as soon as nobody holds or waits for it.
#[derive(Clone, Default)]
pub struct VoteLocks {
    entries: Arc<Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>>,
}

impl VoteLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lock on (voter, target).
    pub async fn lock(&self, voter_id: &str, target_id: &str) -> VoteGuard {
        let key = (voter_id.to_string(), target_id.to_string());
        let entry = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.entry(key.clone()).or_default().clone()
        };

        let guard = entry.lock_owned().await;
        VoteGuard {
            key,
            entries: self.entries.clone(),
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or awaited.
    #[must_use]
    pub fn active(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Holds the lock for one (voter, target) until dropped.
pub struct VoteGuard {
    key: LockKey,
    entries: Arc<Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for VoteGuard {
    fn drop(&mut self) {
        self.guard.take();

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the table's own handle left: no holder, no waiter.
        if entries
            .get(&self.key)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            entries.remove(&self.key);
        }
    }
}
