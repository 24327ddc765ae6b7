mod llm;
mod outreach;
mod prompts;
mod turns;

pub use llm::*;
pub use outreach::*;
pub use prompts::*;
pub use turns::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub turns: TurnsConfig,
    #[serde(default)]
    pub debounce: DebounceConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub outreach: OutreachConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub user: UserConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl Config {
    /// Check the configuration for problems. Errors make the affected
    /// feature unusable; warnings are reported and tolerated.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.llm.providers.is_empty() {
            errors.push(ConfigError::warning("llm.providers", "no LLM providers configured"));
        }

        for (i, provider) in self.llm.providers.iter().enumerate() {
            if provider.id.is_empty() {
                errors.push(ConfigError::error(
                    format!("llm.providers[{i}].id"),
                    "provider id must not be empty",
                ));
            }
            if provider.chat_model.is_empty() {
                errors.push(ConfigError::error(
                    format!("llm.providers[{i}].chat_model"),
                    "chat_model must not be empty",
                ));
            }
            if provider.effective_base_url().is_none() {
                errors.push(ConfigError::error(
                    format!("llm.providers[{i}].base_url"),
                    format!("no base_url and no built-in endpoint for \"{}\"", provider.id),
                ));
            }
            if provider.auth.key.is_none() && provider.auth.env.is_none() {
                errors.push(ConfigError::warning(
                    format!("llm.providers[{i}].auth"),
                    "neither key nor env is set; requests will be rejected",
                ));
            }
        }

        match self.llm.active_provider.as_deref() {
            Some(id) if self.llm.provider(id).is_none() => {
                errors.push(ConfigError::error(
                    "llm.active_provider",
                    format!("\"{id}\" is not a configured provider"),
                ));
            }
            None if !self.llm.providers.is_empty() => {
                errors.push(ConfigError::warning(
                    "llm.active_provider",
                    "not set; the first configured provider is used",
                ));
            }
            _ => {}
        }

        if self.llm.image_generation {
            match self.llm.provider(&self.llm.image_provider) {
                None => errors.push(ConfigError::warning(
                    "llm.image_provider",
                    format!(
                        "\"{}\" is not configured; image directives will be ignored",
                        self.llm.image_provider
                    ),
                )),
                Some(p) if p.image_settings().is_none() => errors.push(ConfigError::warning(
                    "llm.image_provider",
                    format!("\"{}\" has no [image] settings", p.id),
                )),
                Some(_) => {}
            }
        }

        if self.llm.timeout_ms == 0 {
            errors.push(ConfigError::error("llm.timeout_ms", "timeout must be greater than 0"));
        }

        if self.turns.retry_attempts == 0 {
            errors.push(ConfigError::error(
                "turns.retry_attempts",
                "must be at least 1 (1 disables retry)",
            ));
        }
        if self.turns.max_chain_calls == 0 {
            errors.push(ConfigError::error("turns.max_chain_calls", "must be at least 1"));
        }
        if self.turns.group_delay_min_ms > self.turns.group_delay_max_ms {
            errors.push(ConfigError::error(
                "turns.group_delay_min_ms",
                "must not exceed group_delay_max_ms",
            ));
        }
        if self.turns.interrupt_poll_ms == 0 {
            errors.push(ConfigError::error("turns.interrupt_poll_ms", "must be greater than 0"));
        }

        if self.history.min_tail == 0 {
            errors.push(ConfigError::warning(
                "history.min_tail",
                "0 allows an empty history when the newest message exceeds the budget",
            ));
        }
        if self.history.fetch_limit < self.history.min_tail {
            errors.push(ConfigError::error(
                "history.fetch_limit",
                "must be at least history.min_tail",
            ));
        }

        if self.outreach.interval_secs == 0 {
            errors.push(ConfigError::error("outreach.interval_secs", "must be greater than 0"));
        }
        if self.outreach.default_idle_minutes == 0 {
            errors.push(ConfigError::error(
                "outreach.default_idle_minutes",
                "must be greater than 0",
            ));
        }

        if self.persona.timezone.parse::<chrono_tz::Tz>().is_err() {
            errors.push(ConfigError::error(
                "persona.timezone",
                format!("unknown IANA zone \"{}\"", self.persona.timezone),
            ));
        }

        if self.store.state_path.is_empty() {
            errors.push(ConfigError::warning(
                "store.state_path",
                "empty; conversations are not persisted",
            ));
        }

        errors
    }
}
