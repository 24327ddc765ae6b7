//! Per-conversation session task.
//!
//! One task owns a conversation's user input: it persists user messages,
//! runs the debouncer and launches scheduler passes. Passes run as child
//! tasks so new user messages keep being stored while personas are replying
//! (that is how the scheduler notices an interruption). Passes for the same
//! conversation are serialized by the run lock.

use std::time::Duration;

use pal_domain::error::{Error, Result};
use pal_domain::model::{Message, USER_SENDER_ID};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;

use super::debounce::{Debouncer, Pending};
use super::scheduler::dispatch;
use super::status::{SessionStatus, StatusHandle};
use super::{DeliveryOrigin, GenerationRequest};
use crate::state::AppState;

const COMMAND_BUFFER: usize = 64;

#[derive(Debug)]
pub enum SessionCommand {
    /// Store a user message and (re)start the debounce window.
    Submit { text: String, images: Vec<String> },
    /// The user is typing; extends a pending window.
    Typing,
    /// Drop buffered input and re-run the last user message right away.
    Retry,
    /// Drop buffered input without sending it.
    Cancel,
}

/// Client side of a running session.
pub struct SessionHandle {
    conversation_id: String,
    tx: mpsc::Sender<SessionCommand>,
    status: watch::Receiver<SessionStatus>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    pub async fn submit(&self, text: impl Into<String>, images: Vec<String>) -> Result<()> {
        self.send(SessionCommand::Submit {
            text: text.into(),
            images,
        })
        .await
    }

    pub async fn typing(&self) -> Result<()> {
        self.send(SessionCommand::Typing).await
    }

    pub async fn retry(&self) -> Result<()> {
        self.send(SessionCommand::Retry).await
    }

    pub async fn cancel(&self) -> Result<()> {
        self.send(SessionCommand::Cancel).await
    }

    async fn send(&self, cmd: SessionCommand) -> Result<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| Error::Other(format!("session for conversation {} has stopped", self.conversation_id)))
    }

    /// Discard buffered input and wait for running passes to finish.
    pub async fn close(self) {
        let Self { tx, task, .. } = self;
        drop(tx);
        if let Err(e) = task.await {
            tracing::error!(error = %e, "session task panicked");
        }
    }
}

/// Start the session task for `conversation_id`.
pub fn spawn_session(state: AppState, conversation_id: impl Into<String>) -> SessionHandle {
    let conversation_id = conversation_id.into();
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let (status, status_rx) = StatusHandle::new();
    let delay = Duration::from_millis(state.config.debounce.delay_ms);

    let session = ConversationSession {
        state,
        conversation_id: conversation_id.clone(),
        debouncer: Debouncer::new(delay),
        status,
        passes: JoinSet::new(),
    };
    let task = tokio::spawn(session.run(rx));

    SessionHandle {
        conversation_id,
        tx,
        status: status_rx,
        task,
    }
}

struct ConversationSession {
    state: AppState,
    conversation_id: String,
    debouncer: Debouncer,
    status: StatusHandle,
    passes: JoinSet<()>,
}

impl ConversationSession {
    async fn run(mut self, mut rx: mpsc::Receiver<SessionCommand>) {
        tracing::debug!(conversation_id = %self.conversation_id, "session started");
        loop {
            let deadline = self.debouncer.deadline();
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => break,
                },
                _ = sleep_until(deadline), if deadline.is_some() => {
                    self.status.set_waiting(false);
                    if let Some(pending) = self.debouncer.take() {
                        self.launch(pending, DeliveryOrigin::User).await;
                    }
                }
                Some(joined) = self.passes.join_next(), if !self.passes.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(conversation_id = %self.conversation_id, error = %e, "scheduler pass panicked");
                    }
                }
            }
        }

        if self.debouncer.cancel() {
            tracing::debug!(conversation_id = %self.conversation_id, "discarded buffered input on close");
        }
        self.status.set_waiting(false);
        while let Some(joined) = self.passes.join_next().await {
            if let Err(e) = joined {
                tracing::error!(conversation_id = %self.conversation_id, error = %e, "scheduler pass panicked");
            }
        }
        tracing::debug!(conversation_id = %self.conversation_id, "session stopped");
    }

    async fn handle(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Submit { text, images } => {
                if let Err(e) = self.store_user_message(&text, &images).await {
                    tracing::error!(conversation_id = %self.conversation_id, error = %e, "failed to store user message");
                    return;
                }
                self.debouncer.submit(&text, images, Instant::now());
                self.status.set_waiting(self.debouncer.is_pending());
            }
            SessionCommand::Typing => self.debouncer.notify_typing(Instant::now()),
            SessionCommand::Retry => {
                self.debouncer.cancel();
                self.status.set_waiting(false);
                match self.last_user_message().await {
                    Ok(Some(last)) => {
                        let pending = Pending {
                            text: last.content,
                            images: last.images,
                        };
                        self.launch(pending, DeliveryOrigin::Retry).await;
                    }
                    Ok(None) => tracing::warn!(conversation_id = %self.conversation_id, "nothing to retry"),
                    Err(e) => tracing::error!(conversation_id = %self.conversation_id, error = %e, "retry lookup failed"),
                }
            }
            SessionCommand::Cancel => {
                self.debouncer.cancel();
                self.status.set_waiting(false);
            }
        }
    }

    async fn store_user_message(&self, text: &str, images: &[String]) -> Result<()> {
        let text = text.trim();
        if text.is_empty() && images.is_empty() {
            return Ok(());
        }
        let store = self.state.store.as_ref();
        let user_name = store.user_name().await?;
        let message = store
            .create_message(Message::new(
                self.conversation_id.as_str(),
                USER_SENDER_ID,
                user_name,
                text,
                images.to_vec(),
            ))
            .await?;
        store
            .update_conversation_last_message(&self.conversation_id, &message.preview())
            .await
    }

    async fn last_user_message(&self) -> Result<Option<Message>> {
        let recent = self
            .state
            .store
            .get_messages(&self.conversation_id, self.state.config.history.fetch_limit, 0)
            .await?;
        Ok(recent.into_iter().rev().find(Message::is_from_user))
    }

    /// Start a scheduler pass as a child task.
    async fn launch(&mut self, pending: Pending, origin: DeliveryOrigin) {
        let conversation = match self.state.store.get_conversation(&self.conversation_id).await {
            Ok(Some(c)) => c,
            Ok(None) => {
                tracing::warn!(conversation_id = %self.conversation_id, "conversation vanished, dropping input");
                return;
            }
            Err(e) => {
                tracing::error!(conversation_id = %self.conversation_id, error = %e, "failed to load conversation");
                return;
            }
        };

        let req = GenerationRequest::new(
            conversation.id,
            conversation.friend_ids,
            pending.text,
            pending.images,
            origin,
        );
        let state = self.state.clone();
        let status = self.status.clone();
        self.passes.spawn(async move {
            let cid = req.conversation_id.clone();
            match dispatch(&state, req, &status).await {
                Ok(outcome) => tracing::debug!(
                    conversation_id = %cid,
                    delivered = outcome.delivered,
                    failed = outcome.failed.len(),
                    skipped = outcome.skipped.len(),
                    "scheduler pass finished"
                ),
                Err(e) => tracing::error!(conversation_id = %cid, error = %e, "scheduler pass failed"),
            }
        });
    }
}

impl Drop for ConversationSession {
    fn drop(&mut self) {
        self.status.set_waiting(false);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
