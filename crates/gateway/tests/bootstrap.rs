//! App state construction from a config file's worth of settings.

use std::sync::Arc;

use pal_domain::config::Config;
use pal_domain::model::Persona;
use pal_gateway::bootstrap::{build_app_state, BackgroundTasks};
use pal_gateway::runtime::notify::LogSink;
use pal_store::{MemoryStore, Store};

#[tokio::test]
async fn state_persists_to_the_configured_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("palchat.json");

    let mut config = Config::default();
    config.store.state_path = path.to_string_lossy().into_owned();
    config.user.name = "Sam".into();

    let state = build_app_state(config, Arc::new(LogSink)).await.unwrap();
    assert!(state.llm.is_empty());
    assert!(BackgroundTasks::from_config(&state.config).flush);

    let rin = state.store.create_friend(Persona::new("Rin", "shy")).await.unwrap();
    state.store.flush().await.unwrap();

    let reopened = MemoryStore::open(&path, "Sam").unwrap();
    let friends = reopened.list_friends().await.unwrap();
    assert_eq!(friends.len(), 1);
    assert_eq!(friends[0].id, rin.id);
    assert_eq!(reopened.user_name().await.unwrap(), "Sam");
}

#[tokio::test]
async fn empty_state_path_runs_without_persistence() {
    let mut config = Config::default();
    config.store.state_path = String::new();

    let state = build_app_state(config, Arc::new(LogSink)).await.unwrap();
    assert!(!BackgroundTasks::from_config(&state.config).flush);
    state.store.flush().await.unwrap();
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let mut config = Config::default();
    config.store.state_path = String::new();
    config.turns.max_chain_calls = 0;

    let err = build_app_state(config, Arc::new(LogSink)).await.err().unwrap();
    assert!(err.to_string().contains("config validation failed"));
}
