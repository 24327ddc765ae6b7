use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn scheduling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Controls how replies are sequenced across the personas of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnsConfig {
    /// Attempts for a persona's first-turn call (1 = no retry).
    #[serde(default = "d_5")]
    pub retry_attempts: u32,
    /// Backoff before the second attempt; doubles for each further attempt.
    #[serde(default = "d_1000u")]
    pub retry_base_ms: u64,

    /// Pause before a persona continues after emitting `[CONTINUE]`.
    #[serde(default = "d_2000u")]
    pub continuation_delay_ms: u64,
    /// Maximum gateway calls in one continuation chain (first turn included).
    #[serde(default = "d_3")]
    pub max_chain_calls: u32,

    /// Randomized pacing between two personas of a group reply.
    #[serde(default = "d_5000u")]
    pub group_delay_min_ms: u64,
    #[serde(default = "d_10000u")]
    pub group_delay_max_ms: u64,
    /// How often the conversation is re-read for new human messages while
    /// pacing.
    #[serde(default = "d_500u")]
    pub interrupt_poll_ms: u64,

    /// Most recent memories injected into the system prompt.
    #[serde(default = "d_10")]
    pub memory_context: usize,
    /// Affect deltas applied after each delivered reply.
    #[serde(default = "d_2i")]
    pub intimacy_delta: i32,
    #[serde(default = "d_3i")]
    pub mood_delta: i32,
}

impl Default for TurnsConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 5,
            retry_base_ms: 1_000,
            continuation_delay_ms: 2_000,
            max_chain_calls: 3,
            group_delay_min_ms: 5_000,
            group_delay_max_ms: 10_000,
            interrupt_poll_ms: 500,
            memory_context: 10,
            intimacy_delta: 2,
            mood_delta: 3,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Input debounce
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Quiet window after the last submit (or keystroke) before dispatch.
    #[serde(default = "d_3000u")]
    pub delay_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self { delay_ms: 3_000 }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// History window
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Character-budgeted window over the stored conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "d_200")]
    pub fetch_limit: usize,
    #[serde(default = "d_10000")]
    pub char_budget: usize,
    /// Formatting overhead charged per message.
    #[serde(default = "d_50")]
    pub per_message_overhead: usize,
    /// Messages kept regardless of the budget.
    #[serde(default = "d_10")]
    pub min_tail: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            fetch_limit: 200,
            char_budget: 10_000,
            per_message_overhead: 50,
            min_tail: 10,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_3() -> u32 {
    3
}
fn d_5() -> u32 {
    5
}
fn d_2i() -> i32 {
    2
}
fn d_3i() -> i32 {
    3
}
fn d_10() -> usize {
    10
}
fn d_50() -> usize {
    50
}
fn d_200() -> usize {
    200
}
fn d_10000() -> usize {
    10_000
}
fn d_500u() -> u64 {
    500
}
fn d_1000u() -> u64 {
    1_000
}
fn d_2000u() -> u64 {
    2_000
}
fn d_3000u() -> u64 {
    3_000
}
fn d_5000u() -> u64 {
    5_000
}
fn d_10000u() -> u64 {
    10_000
}
