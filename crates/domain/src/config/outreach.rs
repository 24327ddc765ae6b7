use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Idle outreach
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutreachConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// Seconds between sweeps.
    #[serde(default = "d_60u")]
    pub interval_secs: u64,
    /// Used when a persona's `idle_minutes` is zero.
    #[serde(default = "d_30")]
    pub default_idle_minutes: u32,
    #[serde(default)]
    pub policy: OutreachPolicy,
}

impl Default for OutreachConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            default_idle_minutes: 30,
            policy: OutreachPolicy::default(),
        }
    }
}

/// Who-spoke-last rule for idle outreach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutreachPolicy {
    /// Reach out only when the conversation is empty or the persona spoke
    /// last. An unanswered user message is left alone.
    #[default]
    SkipIfUserWaiting,
    /// Reach out only when the user spoke last and got no answer.
    OnlyIfUserWaiting,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Persona presentation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// IANA zone used for "today" and time-of-day prompts.
    #[serde(default = "d_timezone")]
    pub timezone: String,
    /// Redraw outfit/condition and drift mood once per local day.
    #[serde(default = "d_true")]
    pub daily_refresh: bool,
    /// Largest absolute mood change of a daily refresh.
    #[serde(default = "d_20i")]
    pub mood_drift: i32,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            timezone: d_timezone(),
            daily_refresh: true,
            mood_drift: 20,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_true() -> bool {
    true
}
fn d_60u() -> u64 {
    60
}
fn d_30() -> u32 {
    30
}
fn d_20i() -> i32 {
    20
}
fn d_timezone() -> String {
    "Asia/Shanghai".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_snake_case() {
        #[derive(Deserialize)]
        struct Wrap {
            policy: OutreachPolicy,
        }
        let w: Wrap = serde_json::from_str(r#"{ "policy": "only_if_user_waiting" }"#).unwrap();
        assert_eq!(w.policy, OutreachPolicy::OnlyIfUserWaiting);
    }

    #[test]
    fn default_policy_skips_waiting_user() {
        assert_eq!(OutreachConfig::default().policy, OutreachPolicy::SkipIfUserWaiting);
    }
}
