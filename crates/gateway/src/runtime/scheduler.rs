//! Turn scheduler: runs a [`GenerationRequest`] across its target personas.
//!
//! Personas answer one after another in stored order. Before each persona,
//! and while pacing between personas, the conversation's message count is
//! compared with what this pass expects; any difference means somebody else
//! (the user) posted, and the remaining personas are skipped. Replies already
//! delivered stay.

use std::time::Duration;

use pal_domain::error::Result;
use pal_domain::trace::TraceEvent;
use rand::Rng;
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::Instant;

use super::status::StatusHandle;
use super::turn::{run_persona_chain, ChainOutcome};
use super::GenerationRequest;
use crate::state::AppState;

/// Summary of one scheduler pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Messages delivered across all personas.
    pub delivered: usize,
    /// Personas whose chain ran to completion.
    pub completed: Vec<String>,
    /// Personas whose chain ended with an error.
    pub failed: Vec<String>,
    /// Targets skipped because the user posted mid-pass.
    pub skipped: Vec<String>,
}

impl PassOutcome {
    pub fn interrupted(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Wait for the conversation's run lock, then run the pass.
pub async fn dispatch(state: &AppState, req: GenerationRequest, status: &StatusHandle) -> Result<PassOutcome> {
    let permit = state.locks.acquire(&req.conversation_id).await?;
    run_pass(state, req, permit, status).await
}

/// Run a pass while holding `_permit` for the request's conversation.
pub async fn run_pass(
    state: &AppState,
    req: GenerationRequest,
    _permit: OwnedSemaphorePermit,
    status: &StatusHandle,
) -> Result<PassOutcome> {
    let cid = req.conversation_id.as_str();
    let store = state.store.as_ref();
    let turns = &state.config.turns;
    let generating = status.generating(&req.targets);

    let mut outcome = PassOutcome::default();
    let mut expected = store.message_count(cid).await?;

    for (i, persona_id) in req.targets.iter().enumerate() {
        if store.message_count(cid).await? != expected {
            outcome.skipped = req.targets[i..].to_vec();
            break;
        }

        let (text, images) = if i == 0 {
            (req.text.as_str(), req.images.as_slice())
        } else {
            ("", &[][..])
        };

        let mut chain = ChainOutcome::default();
        let result = run_persona_chain(state, cid, persona_id, text, images, req.origin, &mut chain).await;
        expected += chain.delivered;
        outcome.delivered += chain.delivered;
        match result {
            Ok(()) => outcome.completed.push(persona_id.clone()),
            Err(e) => {
                tracing::error!(
                    conversation_id = cid,
                    friend_id = %persona_id,
                    attempt = chain.calls,
                    error = %e,
                    "persona reply failed"
                );
                outcome.failed.push(persona_id.clone());
            }
        }
        generating.finish(persona_id);

        let is_last = i + 1 == req.targets.len();
        if !is_last {
            let delay = group_delay(turns.group_delay_min_ms, turns.group_delay_max_ms);
            let poll = Duration::from_millis(turns.interrupt_poll_ms.max(1));
            if !pace(state, cid, expected, delay, poll).await? {
                outcome.skipped = req.targets[i + 1..].to_vec();
                break;
            }
        }
    }

    if outcome.interrupted() {
        tracing::info!(
            conversation_id = cid,
            remaining = outcome.skipped.len(),
            "user interrupted, skipping remaining personas"
        );
        TraceEvent::TurnInterrupted {
            conversation_id: cid.to_owned(),
            remaining: outcome.skipped.len(),
        }
        .emit();
    }
    Ok(outcome)
}

fn group_delay(min_ms: u64, max_ms: u64) -> Duration {
    let (lo, hi) = if min_ms <= max_ms { (min_ms, max_ms) } else { (max_ms, min_ms) };
    Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
}

/// Sleep for `delay`, checking the message count every `poll`.
/// Returns `false` as soon as the count moves away from `expected`.
async fn pace(state: &AppState, cid: &str, expected: usize, delay: Duration, poll: Duration) -> Result<bool> {
    let deadline = Instant::now() + delay;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return Ok(true);
        }
        tokio::time::sleep(poll.min(deadline - now)).await;
        if state.store.message_count(cid).await? != expected {
            return Ok(false);
        }
    }
}
