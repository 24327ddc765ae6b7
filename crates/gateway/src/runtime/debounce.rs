//! Input debouncer: coalesces rapid user messages into one dispatch.
//!
//! Pure state plus a deadline; the owning session task sleeps until
//! [`Debouncer::deadline`] and then calls [`Debouncer::take`].

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pending {
    pub text: String,
    pub images: Vec<String>,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.text.is_empty() && self.images.is_empty()
    }
}

#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Pending,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Pending::default(),
            deadline: None,
        }
    }

    /// Buffer a message and restart the quiet window.
    pub fn submit(&mut self, text: &str, images: Vec<String>, now: Instant) {
        let text = text.trim();
        if text.is_empty() && images.is_empty() {
            return;
        }
        if !text.is_empty() {
            if !self.pending.text.is_empty() {
                self.pending.text.push('\n');
            }
            self.pending.text.push_str(text);
        }
        self.pending.images.extend(images);
        self.deadline = Some(now + self.delay);
    }

    /// The user is typing: push the deadline out by a full window, but only
    /// while something is buffered.
    pub fn notify_typing(&mut self, now: Instant) {
        if self.deadline.is_some() {
            self.deadline = Some(now + self.delay);
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Capture and clear the buffer. `None` when there is nothing to send.
    pub fn take(&mut self) -> Option<Pending> {
        self.deadline = None;
        let pending = std::mem::take(&mut self.pending);
        (!pending.is_empty()).then_some(pending)
    }

    /// Drop the buffer without dispatching. Returns whether anything was
    /// discarded.
    pub fn cancel(&mut self) -> bool {
        self.take().is_some()
    }
}
