//! Provider registry.
//!
//! Constructs and holds all configured LLM provider instances. At startup the
//! registry reads the [`LlmConfig`], resolves API keys (env vars, direct
//! keys), and instantiates the adapter matching each provider's kind.

use crate::google::GoogleProvider;
use crate::hunyuan::HunyuanProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;
use pal_domain::config::{LlmConfig, ProviderKind};
use pal_domain::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProviderRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Holds all instantiated providers plus the chat and image selections.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    active: Option<String>,
    image: Option<String>,
    image_generation: bool,
}

impl ProviderRegistry {
    /// Build the registry from the application's [`LlmConfig`].
    ///
    /// Providers that fail to initialize (usually a missing key) are logged
    /// and skipped. Selecting one of them later yields a descriptive
    /// [`Error::Config`] or [`Error::ImageGeneration`].
    pub fn from_config(config: &LlmConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
        let mut first_ready: Option<String> = None;

        for pc in &config.providers {
            let kind = pc.kind();
            let result: Result<Arc<dyn LlmProvider>> = match kind {
                ProviderKind::OpenaiCompat => {
                    OpenAiCompatProvider::from_config(pc, timeout, config.temperature)
                        .map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
                }
                ProviderKind::Hunyuan => HunyuanProvider::from_config(pc, timeout, config.temperature)
                    .map(|p| Arc::new(p) as Arc<dyn LlmProvider>),
                ProviderKind::Google => GoogleProvider::from_config(pc, timeout, config.temperature)
                    .map(|p| Arc::new(p) as Arc<dyn LlmProvider>),
            };

            match result {
                Ok(provider) => {
                    tracing::info!(
                        provider_id = %pc.id,
                        kind = ?kind,
                        model = %pc.chat_model,
                        vision = provider.capabilities().supports_vision,
                        "registered LLM provider"
                    );
                    first_ready.get_or_insert_with(|| pc.id.clone());
                    providers.insert(pc.id.clone(), provider);
                }
                Err(e) => {
                    tracing::warn!(
                        provider_id = %pc.id,
                        kind = ?kind,
                        error = %e,
                        "failed to initialize LLM provider, skipping"
                    );
                }
            }
        }

        if providers.is_empty() {
            tracing::warn!("no LLM providers initialized; replies will fail until a key is configured");
        }

        Self {
            providers,
            active: config.active_provider.clone().or(first_ready),
            image: Some(config.image_provider.clone()),
            image_generation: config.image_generation,
        }
    }

    /// Registry over prebuilt providers. The first id is the active one.
    pub fn with_providers(providers: Vec<Arc<dyn LlmProvider>>) -> Self {
        let active = providers.first().map(|p| p.provider_id().to_owned());
        let image = providers
            .iter()
            .find(|p| p.capabilities().supports_image_generation)
            .map(|p| p.provider_id().to_owned());
        Self {
            providers: providers
                .into_iter()
                .map(|p| (p.provider_id().to_owned(), p))
                .collect(),
            active,
            image,
            image_generation: true,
        }
    }

    /// Turn reply-embedded image directives on or off.
    pub fn with_image_generation(mut self, enabled: bool) -> Self {
        self.image_generation = enabled;
        self
    }

    /// Look up a provider by its config id.
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(provider_id).cloned()
    }

    /// The provider that answers as personas.
    pub fn active(&self) -> Result<Arc<dyn LlmProvider>> {
        let id = self
            .active
            .as_deref()
            .ok_or_else(|| Error::Config("no LLM provider configured".into()))?;
        self.get(id).ok_or_else(|| {
            Error::Config(format!(
                "active provider \"{id}\" is not available (missing API key or bad config)"
            ))
        })
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The provider used for `[GEN_IMAGE: ...]` and avatars.
    pub fn image_provider(&self) -> Result<Arc<dyn LlmProvider>> {
        let id = self
            .image
            .as_deref()
            .ok_or_else(|| Error::ImageGeneration("no image provider configured".into()))?;
        let provider = self.get(id).ok_or_else(|| {
            Error::ImageGeneration(format!(
                "image provider \"{id}\" is not available; configure its API key first"
            ))
        })?;
        if !provider.capabilities().supports_image_generation {
            return Err(Error::ImageGeneration(format!(
                "provider \"{id}\" does not support image generation"
            )));
        }
        Ok(provider)
    }

    /// Whether reply-embedded image directives should be honoured.
    pub fn image_generation_enabled(&self) -> bool {
        self.image_generation
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// List all registered provider IDs (sorted).
    pub fn list_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(toml_like: serde_json::Value) -> LlmConfig {
        serde_json::from_value(toml_like).unwrap()
    }

    #[test]
    fn providers_without_keys_are_skipped() {
        let cfg = config(serde_json::json!({
            "providers": [
                { "id": "zhipu", "chat_model": "glm-4.7-flash", "auth": { "env": "PAL_TEST_UNSET_ZHIPU_KEY" } },
                { "id": "groq", "chat_model": "llama-3.3-70b-versatile", "auth": { "key": "gsk" } }
            ]
        }));
        let reg = ProviderRegistry::from_config(&cfg);
        assert_eq!(reg.list_providers(), vec!["groq".to_string()]);
        // falls back to the first provider that initialized
        assert_eq!(reg.active().unwrap().provider_id(), "groq");
    }

    #[test]
    fn missing_active_provider_is_config_error() {
        let cfg = config(serde_json::json!({
            "active_provider": "google",
            "providers": [
                { "id": "groq", "chat_model": "llama-3.3-70b-versatile", "auth": { "key": "gsk" } }
            ]
        }));
        let reg = ProviderRegistry::from_config(&cfg);
        let err = reg.active().err().unwrap();
        assert!(matches!(err, Error::Config(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn image_provider_requires_key_and_support() {
        let cfg = config(serde_json::json!({
            "image_provider": "groq",
            "providers": [
                { "id": "groq", "chat_model": "llama-3.3-70b-versatile", "auth": { "key": "gsk" } }
            ]
        }));
        let reg = ProviderRegistry::from_config(&cfg);
        assert!(matches!(reg.image_provider().err().unwrap(), Error::ImageGeneration(_)));

        let cfg = config(serde_json::json!({
            "providers": [
                { "id": "groq", "chat_model": "llama-3.3-70b-versatile", "auth": { "key": "gsk" } }
            ]
        }));
        // default image provider is zhipu, which is not configured
        let reg = ProviderRegistry::from_config(&cfg);
        let err = reg.image_provider().err().unwrap();
        assert!(err.to_string().contains("zhipu"));

        let cfg = config(serde_json::json!({
            "providers": [
                { "id": "zhipu", "chat_model": "glm-4.7-flash", "auth": { "key": "zk" } }
            ]
        }));
        let reg = ProviderRegistry::from_config(&cfg);
        assert_eq!(reg.image_provider().unwrap().provider_id(), "zhipu");
    }

    #[test]
    fn kinds_map_to_adapters() {
        let cfg = config(serde_json::json!({
            "providers": [
                { "id": "google", "chat_model": "gemini-2.0-flash", "auth": { "key": "a" } },
                { "id": "tencent", "chat_model": "hunyuan-lite", "auth": { "key": "b" } }
            ]
        }));
        let reg = ProviderRegistry::from_config(&cfg);
        assert_eq!(reg.len(), 2);
        assert!(reg.get("google").unwrap().capabilities().supports_vision);
        assert!(!reg.get("tencent").unwrap().capabilities().supports_vision);
    }
}
