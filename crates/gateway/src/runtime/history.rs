//! Character-budgeted history window and per-persona labelling.

use pal_domain::chat::ChatMessage;
use pal_domain::config::HistoryConfig;
use pal_domain::error::Result;
use pal_domain::model::Message;
use pal_store::Store;

/// Newest suffix of `messages` that fits the character budget.
///
/// Walks newest to oldest charging `len + per_message_overhead` per message.
/// The walk stops once the budget is exceeded, but never before `min_tail`
/// messages are kept. Order is preserved.
pub fn window<'a>(messages: &'a [Message], cfg: &HistoryConfig) -> &'a [Message] {
    let mut total = 0usize;
    let mut start = messages.len();
    for (kept, msg) in messages.iter().rev().enumerate() {
        total += msg.content.chars().count() + cfg.per_message_overhead;
        if total > cfg.char_budget && kept >= cfg.min_tail {
            break;
        }
        start -= 1;
    }
    &messages[start..]
}

/// Label a window from the point of view of `persona_id`.
///
/// The persona's own lines are plain assistant turns. Other speakers carry a
/// `[Name]: ` prefix so the model can tell them apart from itself.
pub fn label(messages: &[Message], persona_id: &str, user_name: &str, current_text: &str) -> Vec<ChatMessage> {
    let mut out: Vec<ChatMessage> = messages
        .iter()
        .map(|m| {
            if m.is_from_user() {
                ChatMessage::user(format!("[{user_name}]: {}", m.content))
            } else if m.sender_id == persona_id {
                ChatMessage::assistant(m.content.clone()).named(m.sender_name.clone())
            } else {
                ChatMessage::assistant(format!("[{}]: {}", m.sender_name, m.content)).named(m.sender_name.clone())
            }
        })
        .collect();

    if !current_text.is_empty() {
        out.push(ChatMessage::user(format!("[{user_name}]: {current_text}")));
    }
    out
}

/// Fetch, window and label the conversation for one persona call.
pub async fn build_history(
    store: &dyn Store,
    cfg: &HistoryConfig,
    conversation_id: &str,
    persona_id: &str,
    user_name: &str,
    current_text: &str,
) -> Result<Vec<ChatMessage>> {
    let recent = store.get_messages(conversation_id, cfg.fetch_limit, 0).await?;
    let kept = window(&recent, cfg);
    tracing::debug!(
        conversation_id,
        friend_id = persona_id,
        fetched = recent.len(),
        kept = kept.len(),
        "history window"
    );
    Ok(label(kept, persona_id, user_name, current_text))
}
