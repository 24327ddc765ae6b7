//! One persona's reply: a bounded chain of model calls.
//!
//! Each call builds the persona prompt, windows the history, asks the active
//! model, decodes the reply and persists what is visible. A `[CONTINUE]`
//! marker schedules another call with an empty user message, up to
//! `turns.max_chain_calls` calls in total.

use std::time::{Duration, Instant};

use pal_domain::error::{Error, Result};
use pal_domain::model::{Memory, MemoryKind, Message, IMAGE_PLACEHOLDER};
use pal_domain::trace::TraceEvent;
use pal_providers::{with_retry, ChatRequest, ImageRequest, RetryPolicy};

use super::history::build_history;
use super::prompt;
use super::DeliveryOrigin;
use crate::state::AppState;

/// Importance given to memories the model saves on its own.
const MODEL_MEMORY_IMPORTANCE: u8 = 5;

/// Result of a persona chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainOutcome {
    /// Model calls made, including failed ones.
    pub calls: u32,
    /// Messages persisted and handed to the delivery sink.
    pub delivered: usize,
}

/// Outcome of a single model call.
struct StepOutcome {
    delivered: bool,
    continue_requested: bool,
}

/// Run one persona's reply chain.
///
/// The first call uses the configured retry policy; continuation calls are
/// single-shot. Errors abort the chain but keep what was already delivered:
/// the caller sees the error and `progress` holds the partial outcome.
pub async fn run_persona_chain(
    state: &AppState,
    conversation_id: &str,
    persona_id: &str,
    text: &str,
    images: &[String],
    origin: DeliveryOrigin,
    progress: &mut ChainOutcome,
) -> Result<()> {
    let max_calls = state.config.turns.max_chain_calls.max(1);
    let pause = Duration::from_millis(state.config.turns.continuation_delay_ms);

    let mut text = text;
    let mut images = images;
    for depth in 0..max_calls {
        if depth > 0 {
            tokio::time::sleep(pause).await;
        }
        let policy = if depth == 0 {
            state.retry_policy()
        } else {
            RetryPolicy::none()
        };

        progress.calls += 1;
        let step = run_step(state, conversation_id, persona_id, text, images, origin, &policy).await?;
        if step.delivered {
            progress.delivered += 1;
        }
        if !(step.delivered && step.continue_requested) {
            return Ok(());
        }

        // Continuations answer the updated history.
        text = "";
        images = &[];
    }

    tracing::debug!(conversation_id, friend_id = persona_id, calls = max_calls, "continuation chain capped");
    TraceEvent::ContinuationCapped {
        conversation_id: conversation_id.to_owned(),
        friend_id: persona_id.to_owned(),
        calls: max_calls,
    }
    .emit();
    Ok(())
}

async fn run_step(
    state: &AppState,
    conversation_id: &str,
    persona_id: &str,
    text: &str,
    images: &[String],
    origin: DeliveryOrigin,
    policy: &RetryPolicy,
) -> Result<StepOutcome> {
    let store = state.store.as_ref();
    let persona = store
        .get_friend(persona_id)
        .await?
        .ok_or_else(|| Error::Config(format!("unknown persona {persona_id}")))?;

    let mut memories = store.get_memories(persona_id).await?;
    memories.truncate(state.config.turns.memory_context);
    let user_name = store.user_name().await?;

    let now = prompt::local_now(state.tz);
    let system = prompt::system_prompt(&persona, &memories, &user_name, &now, &state.config.prompts);
    let history = build_history(store, &state.config.history, conversation_id, persona_id, &user_name, text).await?;

    let provider = state.llm.active()?;
    let request = ChatRequest::new(system, history).with_images(images.to_vec());

    let started = Instant::now();
    let chat = provider.as_ref();
    let req = &request;
    let response = with_retry(policy, chat.provider_id(), move || chat.chat(req)).await?;
    TraceEvent::LlmRequest {
        provider: chat.provider_id().to_owned(),
        model: response.model.clone(),
        vision: !images.is_empty() && chat.capabilities().supports_vision,
        duration_ms: started.elapsed().as_millis() as u64,
    }
    .emit();

    let decoded = state.decoder.decode(&response.content);

    let mut generated = Vec::new();
    if let Some(image_prompt) = &decoded.image_prompt {
        if state.llm.image_generation_enabled() {
            match generate_image(state, image_prompt).await {
                Ok(uri) => generated.push(uri),
                Err(e) => tracing::warn!(
                    conversation_id,
                    friend_id = persona_id,
                    error = %e,
                    "image generation failed, sending text only"
                ),
            }
        } else {
            tracing::debug!(friend_id = persona_id, "image directive ignored, generation disabled");
        }
    }

    if let Some(content) = &decoded.memory {
        let memory = Memory::new(persona_id, content.clone(), MODEL_MEMORY_IMPORTANCE, MemoryKind::Fact);
        match store.create_memory(memory).await {
            Ok(saved) => TraceEvent::MemorySaved {
                friend_id: saved.friend_id,
                chars: saved.content.chars().count(),
            }
            .emit(),
            Err(e) => tracing::warn!(friend_id = persona_id, error = %e, "failed to save memory"),
        }
    }

    if decoded.visible_text.is_empty() && generated.is_empty() {
        tracing::debug!(conversation_id, friend_id = persona_id, "reply had nothing visible");
        return Ok(StepOutcome {
            delivered: false,
            continue_requested: decoded.continue_requested,
        });
    }

    let content = if decoded.visible_text.is_empty() {
        IMAGE_PLACEHOLDER.to_owned()
    } else {
        decoded.visible_text
    };
    let has_image = !generated.is_empty();
    let message = store
        .create_message(Message::new(conversation_id, persona_id, persona.name.clone(), content, generated))
        .await?;

    // Once saved, the message is delivered even if the bookkeeping below fails.
    state.sink.delivered(&message, origin);
    if let Err(e) = store
        .update_conversation_last_message(conversation_id, &message.preview())
        .await
    {
        tracing::warn!(conversation_id, error = %e, "failed to update last-message preview");
    }
    if let Err(e) = store
        .update_friend_stats(
            persona_id,
            state.config.turns.intimacy_delta,
            state.config.turns.mood_delta,
        )
        .await
    {
        tracing::warn!(friend_id = persona_id, error = %e, "failed to update friend stats");
    }

    TraceEvent::MessageDelivered {
        conversation_id: conversation_id.to_owned(),
        friend_id: persona_id.to_owned(),
        origin: origin.as_str().to_owned(),
        has_image,
    }
    .emit();

    Ok(StepOutcome {
        delivered: true,
        continue_requested: decoded.continue_requested,
    })
}

/// Generate an image through the configured image provider.
pub async fn generate_image(state: &AppState, prompt: &str) -> Result<String> {
    let provider = state.llm.image_provider()?;
    let image = provider
        .generate_image(&ImageRequest {
            prompt: prompt.to_owned(),
        })
        .await?;
    TraceEvent::ImageGenerated {
        provider: provider.provider_id().to_owned(),
        bytes: image.data_uri.len(),
    }
    .emit();
    Ok(image.data_uri)
}
