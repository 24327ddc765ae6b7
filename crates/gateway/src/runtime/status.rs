//! Observable "waiting" / "generating" indicators for a conversation.
//!
//! Indicators are switched on through guards and switched off when the guard
//! drops, so an early return or a panic in a pass never leaves them stuck.

use std::collections::BTreeSet;

use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatus {
    /// Debounced input is buffered and not yet dispatched.
    pub waiting: bool,
    /// Personas whose reply is still being produced.
    pub generating: BTreeSet<String>,
}

impl SessionStatus {
    pub fn is_idle(&self) -> bool {
        !self.waiting && self.generating.is_empty()
    }
}

/// Sending half of a session's status channel.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    tx: watch::Sender<SessionStatus>,
}

impl StatusHandle {
    pub fn new() -> (Self, watch::Receiver<SessionStatus>) {
        let (tx, rx) = watch::channel(SessionStatus::default());
        (Self { tx }, rx)
    }

    /// A handle nobody listens to (outreach passes, tests).
    pub fn detached() -> Self {
        Self::new().0
    }

    pub fn snapshot(&self) -> SessionStatus {
        self.tx.borrow().clone()
    }

    pub fn set_waiting(&self, waiting: bool) {
        self.tx.send_if_modified(|s| {
            let changed = s.waiting != waiting;
            s.waiting = waiting;
            changed
        });
    }

    /// Mark `ids` as generating until each is finished or the guard drops.
    pub fn generating(&self, ids: &[String]) -> GeneratingGuard {
        self.tx.send_modify(|s| s.generating.extend(ids.iter().cloned()));
        GeneratingGuard {
            handle: self.clone(),
            ids: ids.to_vec(),
        }
    }

    fn finish(&self, id: &str) {
        self.tx.send_if_modified(|s| s.generating.remove(id));
    }
}

/// Clears this pass's generating entries on drop.
#[derive(Debug)]
pub struct GeneratingGuard {
    handle: StatusHandle,
    ids: Vec<String>,
}

impl GeneratingGuard {
    pub fn finish(&self, id: &str) {
        self.handle.finish(id);
    }
}

impl Drop for GeneratingGuard {
    fn drop(&mut self) {
        for id in &self.ids {
            self.handle.finish(id);
        }
    }
}
