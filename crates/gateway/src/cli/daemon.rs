//! `palchat daemon`: headless outreach and daily refresh.
//!
//! Replies produced here are only logged; a later `palchat chat` session
//! shows them from the stored conversation history.

use std::sync::Arc;

use anyhow::Context;

use pal_domain::config::Config;

use crate::bootstrap::{self, BackgroundTasks};
use crate::runtime::notify::LogSink;

pub async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!("palchat daemon starting");

    let state = bootstrap::build_app_state(config, Arc::new(LogSink)).await?;
    let tasks = BackgroundTasks::from_config(&state.config);
    if !tasks.outreach && !tasks.daily_refresh {
        tracing::warn!("outreach and daily refresh are both disabled; the daemon has nothing to do");
    }
    let handles = bootstrap::spawn_background_tasks(&state, tasks);

    shutdown_signal().await;

    for handle in handles {
        handle.abort();
    }
    tracing::info!("daemon stopped, flushing store...");
    state.store.flush().await.context("saving store")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to register SIGTERM handler");
                let _ = ctrl_c.await;
                tracing::info!("received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        tracing::info!("received SIGINT, shutting down");
    }
}
