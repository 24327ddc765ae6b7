//! AppState construction and background-task spawning shared by the `chat`
//! and `daemon` commands.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;

use pal_domain::config::{Config, ConfigSeverity};
use pal_providers::ProviderRegistry;
use pal_store::{MemoryStore, Store};

use crate::runtime::notify::DeliverySink;
use crate::runtime::{outreach, persona_state};
use crate::state::AppState;

/// Validate config, open the store, register providers and return a wired
/// [`AppState`].
pub async fn build_app_state(config: Config, sink: Arc<dyn DeliverySink>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }

    // ── Store ────────────────────────────────────────────────────────
    let store: Arc<dyn Store> = if config.store.state_path.trim().is_empty() {
        tracing::warn!("store.state_path is empty, nothing will be persisted");
        Arc::new(MemoryStore::ephemeral(config.user.name.clone()))
    } else {
        let path = Path::new(&config.store.state_path);
        Arc::new(
            MemoryStore::open(path, config.user.name.clone())
                .with_context(|| format!("opening store at {}", path.display()))?,
        )
    };

    // ── LLM providers ────────────────────────────────────────────────
    let llm = Arc::new(ProviderRegistry::from_config(&config.llm));
    if llm.is_empty() {
        tracing::warn!("no LLM providers ready; configure an API key under [llm.providers]");
    } else {
        tracing::info!(
            providers = llm.len(),
            active = llm.active_id().unwrap_or("-"),
            image_generation = llm.image_generation_enabled(),
            "LLM providers ready"
        );
    }

    AppState::new(config, store, llm, sink).context("building app state")
}

/// Which loops [`spawn_background_tasks`] starts.
#[derive(Debug, Clone, Copy)]
pub struct BackgroundTasks {
    pub flush: bool,
    pub outreach: bool,
    pub daily_refresh: bool,
}

impl BackgroundTasks {
    /// Everything the config enables.
    pub fn from_config(config: &Config) -> Self {
        Self {
            flush: !config.store.state_path.trim().is_empty(),
            outreach: config.outreach.enabled,
            daily_refresh: config.persona.daily_refresh,
        }
    }
}

/// Spawn the long-running background loops. Abort the returned handles to
/// stop them.
pub fn spawn_background_tasks(state: &AppState, tasks: BackgroundTasks) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    // ── Periodic store flush + run-lock pruning ──────────────────────
    if tasks.flush {
        let state = state.clone();
        let every = Duration::from_secs(state.config.store.flush_interval_secs.max(1));
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                if let Err(e) = state.store.flush().await {
                    tracing::warn!(error = %e, "store flush failed");
                }
                state.locks.prune_idle();
            }
        }));
    }

    // ── Daily persona refresh ────────────────────────────────────────
    if tasks.daily_refresh {
        let state = state.clone();
        let every = Duration::from_secs(state.config.outreach.interval_secs.max(1));
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                match persona_state::run_daily_refresh(&state).await {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!(refreshed = n, "daily refresh sweep"),
                    Err(e) => tracing::warn!(error = %e, "daily refresh failed"),
                }
            }
        }));
    }

    // ── Idle outreach sweep ──────────────────────────────────────────
    if tasks.outreach {
        let state = state.clone();
        let every = Duration::from_secs(state.config.outreach.interval_secs.max(1));
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match outreach::run_sweep(&state).await {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!(fired = n, "outreach sweep"),
                    Err(e) => tracing::warn!(error = %e, "outreach sweep failed"),
                }
            }
        }));
    }

    handles
}
