use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use pal_domain::config::Config;
use pal_domain::error::{Error, Result};
use pal_providers::{ProviderRegistry, RetryPolicy};
use pal_store::Store;

use crate::runtime::decoder::Decoder;
use crate::runtime::notify::DeliverySink;
use crate::runtime::outreach::OutreachLedger;
use crate::runtime::prompt;
use crate::runtime::session_lock::ConversationLocks;

/// Shared application state handed to every runtime entry point.
///
/// Fields are grouped by concern:
/// - **Core services**: config, store, LLM providers
/// - **Runtime**: decoder, run locks, outreach ledger, delivery sink
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub llm: Arc<ProviderRegistry>,

    // ── Runtime ───────────────────────────────────────────────────────
    pub decoder: Arc<Decoder>,
    pub locks: Arc<ConversationLocks>,
    /// Last automatic outreach per conversation (in-process only).
    pub outreach: Arc<OutreachLedger>,
    pub sink: Arc<dyn DeliverySink>,
    /// Persona-local timezone used for prompts and daily refresh.
    pub tz: Tz,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        llm: Arc<ProviderRegistry>,
        sink: Arc<dyn DeliverySink>,
    ) -> Result<Self> {
        let decoder = Decoder::new().map_err(|e| Error::Config(format!("decoder patterns: {e}")))?;
        let tz = prompt::timezone(&config.persona.timezone);
        Ok(Self {
            config: Arc::new(config),
            store,
            llm,
            decoder: Arc::new(decoder),
            locks: Arc::new(ConversationLocks::new()),
            outreach: Arc::new(OutreachLedger::default()),
            sink,
            tz,
        })
    }

    /// Backoff for a persona's first call in a chain.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.config.turns.retry_attempts,
            Duration::from_millis(self.config.turns.retry_base_ms),
        )
    }
}
