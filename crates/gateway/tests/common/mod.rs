//! Test doubles shared by the gateway integration tests: a scripted model
//! and an in-memory app state wired to a channel sink.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use pal_domain::capability::LlmCapabilities;
use pal_domain::chat::{ChatMessage, MessageContent};
use pal_domain::config::Config;
use pal_domain::error::{Error, Result};
use pal_domain::model::{Conversation, Memory, Message, Persona};
use pal_gateway::runtime::notify::{ChannelSink, Delivery};
use pal_gateway::state::AppState;
use pal_providers::{ChatRequest, ChatResponse, ImageRequest, ImageResponse, LlmProvider, ProviderRegistry};
use pal_store::{MemoryStore, Store};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;

pub const USER_NAME: &str = "Sam";
pub const FAKE_IMAGE: &str = "data:image/png;base64,iVBORw0KGgo=";

// ── Scripted provider ───────────────────────────────────────────────

/// Answers chat calls from a queue, in call order. An empty queue answers
/// `"ok"`.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<ChatRequest>>,
    images: Mutex<Vec<String>>,
    image_fails: AtomicBool,
    latency: Mutex<Option<std::time::Duration>>,
    caps: LlmCapabilities,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            images: Mutex::new(Vec::new()),
            image_fails: AtomicBool::new(false),
            latency: Mutex::new(None),
            caps: LlmCapabilities {
                supports_vision: true,
                supports_image_generation: true,
            },
        })
    }

    pub fn replying(replies: &[&str]) -> Arc<Self> {
        Self::new(replies.iter().map(|r| Ok((*r).to_owned())).collect())
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    /// Delay every later chat answer by `latency`.
    pub fn slow(&self, latency: std::time::Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Make every later image call fail.
    pub fn fail_images(&self) {
        self.image_fails.store(true, Ordering::SeqCst);
    }

    /// Prompts passed to image generation.
    pub fn image_prompts(&self) -> Vec<String> {
        self.images.lock().clone()
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().push(req.clone());
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let next = self.replies.lock().pop_front();
        let content = match next {
            Some(reply) => reply?,
            None => "ok".to_owned(),
        };
        Ok(ChatResponse {
            content,
            model: "scripted-1".into(),
            finish_reason: Some("stop".into()),
        })
    }

    async fn generate_image(&self, req: &ImageRequest) -> Result<ImageResponse> {
        self.images.lock().push(req.prompt.clone());
        if self.image_fails.load(Ordering::SeqCst) {
            return Err(Error::ImageGeneration("content filter".into()));
        }
        Ok(ImageResponse {
            data_uri: FAKE_IMAGE.into(),
        })
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.caps
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }
}

pub fn rejected() -> Error {
    Error::Provider {
        provider: "scripted".into(),
        status: 401,
        body: "bad key".into(),
    }
}

pub fn overloaded() -> Error {
    Error::Provider {
        provider: "scripted".into(),
        status: 503,
        body: "overloaded".into(),
    }
}

// ── Flaky store ─────────────────────────────────────────────────────

/// In-memory store whose message reads fail for one chosen conversation.
pub struct FlakyStore {
    inner: MemoryStore,
    broken: Mutex<Option<String>>,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::ephemeral(USER_NAME),
            broken: Mutex::new(None),
        })
    }

    pub fn break_reads_of(&self, conversation_id: &str) {
        *self.broken.lock() = Some(conversation_id.to_owned());
    }

    fn check(&self, conversation_id: &str) -> Result<()> {
        if self.broken.lock().as_deref() == Some(conversation_id) {
            return Err(Error::Store(format!("cannot read conversation {conversation_id}")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Store for FlakyStore {
    async fn get_friend(&self, id: &str) -> Result<Option<Persona>> {
        self.inner.get_friend(id).await
    }
    async fn list_friends(&self) -> Result<Vec<Persona>> {
        self.inner.list_friends().await
    }
    async fn get_messages(&self, conversation_id: &str, limit: usize, offset: usize) -> Result<Vec<Message>> {
        self.check(conversation_id)?;
        self.inner.get_messages(conversation_id, limit, offset).await
    }
    async fn message_count(&self, conversation_id: &str) -> Result<usize> {
        self.inner.message_count(conversation_id).await
    }
    async fn get_memories(&self, friend_id: &str) -> Result<Vec<Memory>> {
        self.inner.get_memories(friend_id).await
    }
    async fn get_conversations(&self) -> Result<Vec<Conversation>> {
        self.inner.get_conversations().await
    }
    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        self.inner.get_conversation(id).await
    }
    async fn get_last_message(&self, conversation_id: &str) -> Result<Option<Message>> {
        self.check(conversation_id)?;
        self.inner.get_last_message(conversation_id).await
    }
    async fn user_name(&self) -> Result<String> {
        self.inner.user_name().await
    }
    async fn create_message(&self, message: Message) -> Result<Message> {
        self.inner.create_message(message).await
    }
    async fn update_conversation_last_message(&self, conversation_id: &str, text: &str) -> Result<()> {
        self.inner.update_conversation_last_message(conversation_id, text).await
    }
    async fn update_friend_stats(&self, id: &str, intimacy_delta: i32, mood_delta: i32) -> Result<()> {
        self.inner.update_friend_stats(id, intimacy_delta, mood_delta).await
    }
    async fn create_memory(&self, memory: Memory) -> Result<Memory> {
        self.inner.create_memory(memory).await
    }
    async fn create_friend(&self, friend: Persona) -> Result<Persona> {
        self.inner.create_friend(friend).await
    }
    async fn update_friend(&self, friend: Persona) -> Result<()> {
        self.inner.update_friend(friend).await
    }
    async fn delete_friend(&self, id: &str) -> Result<()> {
        self.inner.delete_friend(id).await
    }
    async fn create_conversation(&self, conversation: Conversation) -> Result<Conversation> {
        self.inner.create_conversation(conversation).await
    }
    async fn delete_conversation(&self, id: &str) -> Result<()> {
        self.inner.delete_conversation(id).await
    }
    async fn delete_message(&self, message_id: &str) -> Result<()> {
        self.inner.delete_message(message_id).await
    }
    async fn clear_conversation(&self, id: &str) -> Result<()> {
        self.inner.clear_conversation(id).await
    }
    async fn delete_memory(&self, id: &str) -> Result<()> {
        self.inner.delete_memory(id).await
    }
}

// ── App state ───────────────────────────────────────────────────────

pub struct Harness {
    pub state: AppState,
    pub llm: Arc<ScriptedProvider>,
    pub deliveries: UnboundedReceiver<Delivery>,
}

impl Harness {
    pub fn new(llm: Arc<ScriptedProvider>) -> Self {
        Self::with_config(llm, |_| {})
    }

    pub fn with_config(llm: Arc<ScriptedProvider>, tweak: impl FnOnce(&mut Config)) -> Self {
        Self::build(llm, Arc::new(MemoryStore::ephemeral(USER_NAME)), tweak)
    }

    pub fn with_store(llm: Arc<ScriptedProvider>, store: Arc<dyn Store>) -> Self {
        Self::build(llm, store, |_| {})
    }

    fn build(llm: Arc<ScriptedProvider>, store: Arc<dyn Store>, tweak: impl FnOnce(&mut Config)) -> Self {
        let mut config = Config::default();
        config.persona.timezone = "UTC".into();
        tweak(&mut config);

        let registry = ProviderRegistry::with_providers(vec![llm.clone() as Arc<dyn LlmProvider>])
            .with_image_generation(config.llm.image_generation);
        let (sink, deliveries) = ChannelSink::new();
        let state = AppState::new(config, store, Arc::new(registry), Arc::new(sink)).unwrap();
        Self { state, llm, deliveries }
    }

    pub fn store(&self) -> &dyn Store {
        self.state.store.as_ref()
    }

    pub async fn friend(&self, name: &str) -> Persona {
        self.store().create_friend(Persona::new(name, "cheerful")).await.unwrap()
    }

    pub async fn private_chat(&self, persona: &Persona) -> Conversation {
        self.store().open_private_conversation(&persona.id).await.unwrap()
    }

    /// A private chat that was created `minutes` ago.
    pub async fn quiet_chat(&self, persona: &Persona, minutes: i64) -> Conversation {
        let mut conversation = Conversation::private(&persona.id);
        conversation.created_at = Utc::now() - Duration::minutes(minutes);
        self.store().create_conversation(conversation).await.unwrap()
    }

    pub async fn group(&self, members: &[&Persona]) -> Conversation {
        let ids = members.iter().map(|p| p.id.clone()).collect();
        self.store()
            .create_conversation(Conversation::group("crew", ids))
            .await
            .unwrap()
    }

    pub async fn next_delivery(&mut self) -> Delivery {
        self.deliveries.recv().await.expect("delivery channel closed")
    }

    pub fn no_pending_delivery(&mut self) -> bool {
        self.deliveries.try_recv().is_err()
    }
}

pub fn text_of(message: &ChatMessage) -> String {
    match &message.content {
        MessageContent::Text(t) => t.clone(),
        MessageContent::Parts(parts) => format!("{parts:?}"),
    }
}

/// Text of the last message in a recorded request.
pub fn last_text(req: &ChatRequest) -> String {
    req.messages.last().map(text_of).unwrap_or_default()
}
