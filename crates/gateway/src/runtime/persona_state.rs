//! Persona presentation: daily refresh, model-generated state, avatars.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use pal_domain::chat::ChatMessage;
use pal_domain::error::Result;
use pal_domain::model::{Persona, MOOD_MAX};
use pal_domain::trace::TraceEvent;
use pal_providers::{ChatRequest, RetryPolicy};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;

use super::turn::generate_image;
use crate::state::AppState;

pub const OUTFITS: &[&str] = &[
    "oversized hoodie",
    "floral sundress",
    "fitted blazer",
    "fluffy pajamas",
    "tracksuit",
    "white shirt",
    "knit cardigan",
    "denim jacket",
    "plaid shirt",
    "black turtleneck",
    "pleated skirt",
    "cargo pants",
    "zip-up hoodie",
    "silk pajamas",
    "vintage overalls",
    "off-shoulder top",
    "casual shorts",
    "long trench coat",
    "yoga outfit",
    "cotton T-shirt",
];

pub const CONDITIONS: &[&str] = &[
    "full of energy",
    "a bit sleepy",
    "refreshed",
    "so-so",
    "really wants a nap",
    "stuffy nose",
    "very hungry",
    "lively",
    "sore back",
    "in a good mood",
    "a little dizzy",
    "starving",
    "clear-headed",
    "feeling a bit emo",
    "bursting with energy",
    "thirsty",
    "relaxed",
    "slightly tired",
    "focused",
    "irritable",
];

const DEFAULT_OUTFIT: &str = "casual clothes";
const DEFAULT_CONDITION: &str = "doing fine";
const DEFAULT_MOOD: i32 = 50;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Daily refresh
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Whether `persona` has not been refreshed yet on the local day of `now`.
pub fn refresh_due(persona: &Persona, now: DateTime<Utc>, tz: Tz) -> bool {
    match persona.last_state_update {
        None => true,
        Some(last) => last.with_timezone(&tz).date_naive() != now.with_timezone(&tz).date_naive(),
    }
}

/// Drift the mood by up to `drift` either way and draw a new outfit and
/// condition.
pub fn refresh_presentation<R: Rng + ?Sized>(persona: &mut Persona, rng: &mut R, drift: i32, now: DateTime<Utc>) {
    let drift = drift.abs();
    persona.mood = (persona.mood + rng.gen_range(-drift..=drift)).clamp(0, MOOD_MAX);
    persona.outfit = OUTFITS.choose(rng).map(|s| (*s).to_owned());
    persona.physical_condition = CONDITIONS.choose(rng).map(|s| (*s).to_owned());
    persona.last_state_update = Some(now);
}

/// Refresh every persona whose state is from a previous local day.
pub async fn run_daily_refresh(state: &AppState) -> Result<usize> {
    let store = state.store.as_ref();
    let now = Utc::now();
    let drift = state.config.persona.mood_drift;
    let mut refreshed = 0;

    for mut persona in store.list_friends().await? {
        if !refresh_due(&persona, now, state.tz) {
            continue;
        }
        refresh_presentation(&mut persona, &mut rand::thread_rng(), drift, now);
        let (id, mood) = (persona.id.clone(), persona.mood);
        store.update_friend(persona).await?;
        tracing::info!(friend_id = %id, mood, "refreshed persona for a new day");
        TraceEvent::PersonaRefreshed { friend_id: id, mood }.emit();
        refreshed += 1;
    }
    Ok(refreshed)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model-generated state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaState {
    pub outfit: String,
    pub physical_condition: String,
    pub mood: i32,
}

impl Default for PersonaState {
    fn default() -> Self {
        Self {
            outfit: DEFAULT_OUTFIT.into(),
            physical_condition: DEFAULT_CONDITION.into(),
            mood: DEFAULT_MOOD,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct RawState {
    outfit: Option<String>,
    physical_condition: Option<String>,
    mood: Option<f64>,
}

/// Read the first `{ … }` block of a model reply. Missing or malformed
/// fields fall back to defaults; mood is clamped.
pub fn parse_persona_state(reply: &str) -> PersonaState {
    let raw = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<RawState>(&reply[start..=end]).unwrap_or_default()
        }
        _ => RawState::default(),
    };
    let non_empty = |v: Option<String>, fallback: &str| {
        v.map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| fallback.to_owned())
    };
    PersonaState {
        outfit: non_empty(raw.outfit, DEFAULT_OUTFIT),
        physical_condition: non_empty(raw.physical_condition, DEFAULT_CONDITION),
        mood: raw
            .mood
            .filter(|m| m.is_finite() && *m != 0.0)
            .map_or(DEFAULT_MOOD, |m| (m.round() as i32).clamp(0, MOOD_MAX)),
    }
}

/// Ask the active model for a fresh outfit, condition and mood. Never fails:
/// any error yields the defaults.
pub async fn generate_persona_state(state: &AppState, persona: &Persona) -> PersonaState {
    let prompt = format!(
        "As {}, generate your current state based on the recent chat. Personality: {}\nReturn JSON: {{\"outfit\": \"...\", \"physicalCondition\": \"...\", \"mood\": 0-100}}",
        persona.name, persona.personality
    );
    let request = ChatRequest::new("JSON Generator", vec![ChatMessage::user(prompt)]);

    let reply = match state.llm.active() {
        Ok(provider) => {
            let chat = provider.as_ref();
            let req = &request;
            pal_providers::with_retry(&RetryPolicy::none(), chat.provider_id(), move || chat.chat(req)).await
        }
        Err(e) => Err(e),
    };
    match reply {
        Ok(resp) => parse_persona_state(&resp.content),
        Err(e) => {
            tracing::warn!(friend_id = %persona.id, error = %e, "persona state generation failed, using defaults");
            PersonaState::default()
        }
    }
}

/// Generate and store a new state for `persona_id`.
pub async fn regenerate_state(state: &AppState, persona_id: &str) -> Result<Persona> {
    let store = state.store.as_ref();
    let mut persona = store
        .get_friend(persona_id)
        .await?
        .ok_or_else(|| pal_domain::error::Error::NotFound(format!("persona {persona_id}")))?;
    let fresh = generate_persona_state(state, &persona).await;
    persona.outfit = Some(fresh.outfit);
    persona.physical_condition = Some(fresh.physical_condition);
    persona.mood = fresh.mood;
    persona.last_state_update = Some(Utc::now());
    store.update_friend(persona.clone()).await?;
    Ok(persona)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Avatar
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn avatar_prompt(persona: &Persona) -> String {
    let mut prompt = format!(
        "Anime-style avatar of {}. Personality: {}.",
        persona.name, persona.personality
    );
    if !persona.appearance.trim().is_empty() {
        prompt.push_str(&format!(" Appearance: {}.", persona.appearance.trim()));
    }
    prompt.push_str(" Front-facing portrait, simple background.");
    prompt
}

/// Generate an avatar image and return it as a data URI.
pub async fn generate_avatar(state: &AppState, persona: &Persona) -> Result<String> {
    generate_image(state, &avatar_prompt(persona)).await
}
