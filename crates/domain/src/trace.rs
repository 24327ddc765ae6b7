use serde::Serialize;

/// Structured trace events emitted across all palchat crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    LlmRequest {
        provider: String,
        model: String,
        vision: bool,
        duration_ms: u64,
    },
    LlmRetry {
        provider: String,
        attempt: u32,
        delay_ms: u64,
        reason: String,
    },
    ImageGenerated {
        provider: String,
        bytes: usize,
    },
    MessageDelivered {
        conversation_id: String,
        friend_id: String,
        origin: String,
        has_image: bool,
    },
    TurnInterrupted {
        conversation_id: String,
        remaining: usize,
    },
    ContinuationCapped {
        conversation_id: String,
        friend_id: String,
        calls: u32,
    },
    MemorySaved {
        friend_id: String,
        chars: usize,
    },
    OutreachFired {
        conversation_id: String,
        friend_id: String,
        idle_minutes: i64,
    },
    PersonaRefreshed {
        friend_id: String,
        mood: i32,
    },
    StoreFlushed {
        path: String,
        conversations: usize,
        messages: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "pal_event");
    }
}
