//! Idle outreach: personas message the user after a silence window.
//!
//! A sweep walks every persona with auto-reply enabled. A persona fires when
//! its private conversation has been quiet for `idle_minutes`, its previous
//! outreach in that conversation is at least as old, and the
//! [`OutreachPolicy`] allows it. Busy conversations are skipped, not waited
//! for.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use pal_domain::config::OutreachPolicy;
use pal_domain::error::Result;
use pal_domain::model::{Conversation, Message, Persona};
use pal_domain::trace::TraceEvent;
use parking_lot::Mutex;
use rand::Rng;

use super::prompt::{local_now, outreach_prompt, OUTREACH_SCENARIOS};
use super::scheduler::run_pass;
use super::status::StatusHandle;
use super::{DeliveryOrigin, GenerationRequest};
use crate::state::AppState;

/// Messages read to find the recent topic.
const TOPIC_LOOKBACK: usize = 10;

/// Last outreach time per conversation. In-process only.
#[derive(Debug, Default)]
pub struct OutreachLedger {
    last: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl OutreachLedger {
    pub fn last_outreach(&self, conversation_id: &str) -> Option<DateTime<Utc>> {
        self.last.lock().get(conversation_id).copied()
    }

    pub fn record(&self, conversation_id: &str, at: DateTime<Utc>) {
        self.last.lock().insert(conversation_id.to_owned(), at);
    }
}

/// Why a persona did or did not reach out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutreachDecision {
    Fire { idle_minutes: i64 },
    TooSoon,
    RecentlyFired,
    PolicyBlocked,
}

/// Pure firing rule for one persona's private conversation.
///
/// `default_idle` replaces an `idle_minutes` of zero.
pub fn decide(
    persona: &Persona,
    conversation: &Conversation,
    last_message: Option<&Message>,
    last_outreach: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    policy: OutreachPolicy,
    default_idle: u32,
) -> OutreachDecision {
    let idle = match persona.auto_reply.idle_minutes {
        0 => default_idle,
        n => n,
    } as i64;

    let base = last_message.map_or(conversation.created_at, |m| m.timestamp);
    let quiet = (now - base).num_minutes();
    if quiet < idle {
        return OutreachDecision::TooSoon;
    }
    if let Some(prev) = last_outreach {
        if (now - prev).num_minutes() < idle {
            return OutreachDecision::RecentlyFired;
        }
    }

    let user_spoke_last = last_message.is_some_and(Message::is_from_user);
    let allowed = match policy {
        OutreachPolicy::SkipIfUserWaiting => !user_spoke_last,
        OutreachPolicy::OnlyIfUserWaiting => user_spoke_last,
    };
    if !allowed {
        return OutreachDecision::PolicyBlocked;
    }
    OutreachDecision::Fire { idle_minutes: quiet }
}

/// Run one sweep. Returns the number of personas that reached out.
///
/// A store error for one persona is logged and the sweep moves on.
pub async fn run_sweep(state: &AppState) -> Result<usize> {
    let mut fired = 0;
    for persona in state.store.list_friends().await? {
        if !persona.auto_reply.enabled {
            continue;
        }
        match sweep_persona(state, &persona).await {
            Ok(true) => fired += 1,
            Ok(false) => {}
            Err(e) => tracing::error!(friend_id = %persona.id, error = %e, "outreach check failed"),
        }
    }
    Ok(fired)
}

/// Check one persona and reach out if due. `Ok(true)` when a reply landed.
async fn sweep_persona(state: &AppState, persona: &Persona) -> Result<bool> {
    let store = state.store.as_ref();
    let cfg = &state.config.outreach;

    let Some(conversation) = store.find_private_conversation(&persona.id).await? else {
        tracing::debug!(friend_id = %persona.id, "no private conversation, skipping outreach");
        return Ok(false);
    };

    let last = store.get_last_message(&conversation.id).await?;
    let now = Utc::now();
    let decision = decide(
        persona,
        &conversation,
        last.as_ref(),
        state.outreach.last_outreach(&conversation.id),
        now,
        cfg.policy,
        cfg.default_idle_minutes,
    );
    let OutreachDecision::Fire { idle_minutes } = decision else {
        tracing::trace!(friend_id = %persona.id, ?decision, "outreach not due");
        return Ok(false);
    };

    let Some(permit) = state.locks.try_acquire(&conversation.id) else {
        tracing::debug!(conversation_id = %conversation.id, "conversation busy, skipping outreach");
        return Ok(false);
    };

    state.outreach.record(&conversation.id, now);
    tracing::info!(
        conversation_id = %conversation.id,
        friend_id = %persona.id,
        idle_minutes,
        "persona reaching out"
    );
    TraceEvent::OutreachFired {
        conversation_id: conversation.id.clone(),
        friend_id: persona.id.clone(),
        idle_minutes,
    }
    .emit();

    let recent = store.get_messages(&conversation.id, TOPIC_LOOKBACK, 0).await?;
    let scenario = rand::thread_rng().gen_range(0..OUTREACH_SCENARIOS);
    let prompt = outreach_prompt(persona, &recent, &local_now(state.tz), scenario, &state.config.prompts);

    let req = GenerationRequest::new(
        conversation.id.clone(),
        vec![persona.id.clone()],
        prompt,
        Vec::new(),
        DeliveryOrigin::Outreach,
    );
    match run_pass(state, req, permit, &StatusHandle::detached()).await {
        Ok(outcome) if outcome.failed.is_empty() => Ok(true),
        Ok(_) => {
            tracing::warn!(friend_id = %persona.id, "outreach reply failed");
            Ok(false)
        }
        Err(e) => {
            tracing::error!(friend_id = %persona.id, error = %e, "outreach pass failed");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pal_domain::model::USER_SENDER_ID;

    fn setup(idle: u32) -> (Persona, Conversation, DateTime<Utc>) {
        let mut p = Persona::new("Rin", "shy");
        p.auto_reply.enabled = true;
        p.auto_reply.idle_minutes = idle;
        let mut c = Conversation::private(&p.id);
        let t0 = Utc::now();
        c.created_at = t0;
        (p, c, t0)
    }

    fn msg_at(sender: &str, at: DateTime<Utc>) -> Message {
        let mut m = Message::new("c", sender, "x", "hi", vec![]);
        m.timestamp = at;
        m
    }

    const SKIP: OutreachPolicy = OutreachPolicy::SkipIfUserWaiting;
    const ONLY: OutreachPolicy = OutreachPolicy::OnlyIfUserWaiting;

    #[test]
    fn waits_for_idle_window_from_creation() {
        let (p, c, t0) = setup(10);
        assert_eq!(decide(&p, &c, None, None, t0 + Duration::minutes(9), SKIP, 30), OutreachDecision::TooSoon);
        assert_eq!(
            decide(&p, &c, None, None, t0 + Duration::minutes(10), SKIP, 30),
            OutreachDecision::Fire { idle_minutes: 10 }
        );
    }

    #[test]
    fn zero_idle_uses_default() {
        let (p, c, t0) = setup(0);
        assert_eq!(decide(&p, &c, None, None, t0 + Duration::minutes(29), SKIP, 30), OutreachDecision::TooSoon);
        assert!(matches!(
            decide(&p, &c, None, None, t0 + Duration::minutes(30), SKIP, 30),
            OutreachDecision::Fire { .. }
        ));
    }

    #[test]
    fn never_fires_twice_within_idle_window() {
        let (p, c, t0) = setup(10);
        let last = msg_at(&p.id, t0);
        let fired_at = t0 + Duration::minutes(10);
        assert!(matches!(decide(&p, &c, Some(&last), None, fired_at, SKIP, 30), OutreachDecision::Fire { .. }));

        // the persona's own outreach message is not counted here: the ledger alone blocks
        let later = fired_at + Duration::minutes(9);
        assert_eq!(decide(&p, &c, Some(&last), Some(fired_at), later, SKIP, 30), OutreachDecision::RecentlyFired);
        assert!(matches!(
            decide(&p, &c, Some(&last), Some(fired_at), fired_at + Duration::minutes(10), SKIP, 30),
            OutreachDecision::Fire { .. }
        ));
    }

    #[test]
    fn skip_policy_leaves_waiting_user_alone() {
        let (p, c, t0) = setup(10);
        let user_last = msg_at(USER_SENDER_ID, t0);
        let now = t0 + Duration::minutes(20);
        assert_eq!(decide(&p, &c, Some(&user_last), None, now, SKIP, 30), OutreachDecision::PolicyBlocked);
        assert!(matches!(decide(&p, &c, None, None, now, SKIP, 30), OutreachDecision::Fire { .. }));
    }

    #[test]
    fn only_policy_requires_waiting_user() {
        let (p, c, t0) = setup(10);
        let user_last = msg_at(USER_SENDER_ID, t0);
        let persona_last = msg_at(&p.id, t0);
        let now = t0 + Duration::minutes(20);
        assert!(matches!(decide(&p, &c, Some(&user_last), None, now, ONLY, 30), OutreachDecision::Fire { .. }));
        assert_eq!(decide(&p, &c, Some(&persona_last), None, now, ONLY, 30), OutreachDecision::PolicyBlocked);
        assert_eq!(decide(&p, &c, None, None, now, ONLY, 30), OutreachDecision::PolicyBlocked);
    }

    #[test]
    fn ledger_records_latest() {
        let ledger = OutreachLedger::default();
        assert!(ledger.last_outreach("c1").is_none());
        let t = Utc::now();
        ledger.record("c1", t);
        assert_eq!(ledger.last_outreach("c1"), Some(t));
    }
}
