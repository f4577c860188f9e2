//! Per-session serialization.
//!
//! At most one exchange may run against a session at a time, otherwise
//! concurrent callers could interleave user and assistant turns.

use std::sync::Arc;

use dashmap::DashMap;
use polybot_types::chat::SessionId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lazily created async mutex per session identifier.
#[derive(Default)]
pub struct SessionLocks {
    locks: DashMap<SessionId, Arc<Mutex<()>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other holder is working on `session_id`.
    ///
    /// The guard releases the session when dropped.
    pub async fn acquire(&self, session_id: &SessionId) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(session_id.clone()).or_default().clone();
        lock.lock_owned().await
    }

    /// Drop the lock entry for a deleted session.
    ///
    /// The entry stays while any caller still holds or waits on it, so a
    /// queued exchange and later callers keep sharing one mutex. Call after
    /// releasing your own guard.
    pub fn forget(&self, session_id: &SessionId) {
        self.locks
            .remove_if(session_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
