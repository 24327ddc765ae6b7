//! Per-conversation run locks.
//!
//! Only one scheduler pass runs per conversation at a time. User-triggered
//! passes queue behind the running one; the outreach sweep skips busy
//! conversations instead of waiting.

use std::collections::HashMap;
use std::sync::Arc;

use pal_domain::error::{Error, Result};
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Each conversation id maps to a `Semaphore(1)`. Hold the permit for the
/// whole pass; it releases on drop.
pub struct ConversationLocks {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Default for ConversationLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn semaphore(&self, conversation_id: &str) -> Arc<Semaphore> {
        let mut locks = self.locks.lock();
        locks
            .entry(conversation_id.to_owned())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone()
    }

    /// Wait until the conversation is free.
    pub async fn acquire(&self, conversation_id: &str) -> Result<OwnedSemaphorePermit> {
        self.semaphore(conversation_id)
            .acquire_owned()
            .await
            .map_err(|_| Error::Other(format!("run lock for conversation {conversation_id} was closed")))
    }

    /// Take the lock only if nobody holds it.
    pub fn try_acquire(&self, conversation_id: &str) -> Option<OwnedSemaphorePermit> {
        self.semaphore(conversation_id).try_acquire_owned().ok()
    }

    /// Number of tracked conversations.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget locks nobody is holding or about to take. A waiter that cloned
    /// the semaphore but has not locked it yet keeps the entry alive.
    pub fn prune_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, sem| Arc::strong_count(sem) > 1 || sem.available_permits() == 0);
    }
}
