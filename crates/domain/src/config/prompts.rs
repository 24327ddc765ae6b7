use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Prompt customization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// Prepended to every persona system prompt.
    #[serde(default)]
    pub system_prefix: String,
    /// Appended to every persona system prompt.
    #[serde(default)]
    pub system_suffix: String,
    /// Wrapping around the hidden prompt that starts an idle outreach.
    #[serde(default = "d_open_paren")]
    pub outreach_prefix: String,
    #[serde(default = "d_close_paren")]
    pub outreach_suffix: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            system_prefix: String::new(),
            system_suffix: String::new(),
            outreach_prefix: d_open_paren(),
            outreach_suffix: d_close_paren(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// How the human is labelled in persona histories.
    #[serde(default = "d_user_name")]
    pub name: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self { name: d_user_name() }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON snapshot location. Empty disables persistence.
    #[serde(default = "d_state_path")]
    pub state_path: String,
    #[serde(default = "d_30u")]
    pub flush_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
            flush_interval_secs: 30,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_open_paren() -> String {
    "(".into()
}
fn d_close_paren() -> String {
    ")".into()
}
fn d_user_name() -> String {
    "User".into()
}
fn d_state_path() -> String {
    "./data/palchat.json".into()
}
fn d_30u() -> u64 {
    30
}
