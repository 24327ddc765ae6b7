//! OpenAI-compatible adapter.
//!
//! Works with Zhipu, Groq, Volcengine Ark, ModelScope and any other endpoint
//! that follows the OpenAI chat completions contract. Providers with an
//! `[image]` table also get `/images/generations`.

use crate::catalog;
use crate::traits::{ChatRequest, ChatResponse, ImageRequest, ImageResponse, LlmProvider};
use crate::util::{self, from_reqwest};
use pal_domain::capability::LlmCapabilities;
use pal_domain::chat::{ChatMessage, ContentPart, MessageContent};
use pal_domain::config::{ImageModelConfig, ProviderConfig};
use pal_domain::error::{Error, Result};
use serde_json::Value;
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    auth_header: String,
    auth_prefix: String,
    chat_model: String,
    temperature: f32,
    image: Option<ImageModelConfig>,
    capabilities: LlmCapabilities,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new provider from the deserialized provider config.
    pub fn from_config(cfg: &ProviderConfig, timeout: Duration, temperature: f32) -> Result<Self> {
        let base_url = cfg.effective_base_url().ok_or_else(|| {
            Error::Config(format!("provider {}: base_url is required", cfg.id))
        })?;
        let api_key = util::resolve_api_key(&cfg.auth)?;
        let image = cfg.image_settings();

        let capabilities = LlmCapabilities {
            supports_vision: catalog::supports_vision(&cfg.id, &cfg.chat_model, cfg.vision),
            supports_image_generation: image.is_some(),
        };

        Ok(Self {
            id: cfg.id.clone(),
            base_url,
            api_key,
            auth_header: cfg.auth.header.clone().unwrap_or_else(|| "Authorization".into()),
            auth_prefix: cfg.auth.prefix.clone().unwrap_or_else(|| "Bearer ".into()),
            chat_model: cfg.chat_model.clone(),
            temperature,
            image,
            capabilities,
            client: util::build_client(timeout)?,
        })
    }

    // ── Internal: build authenticated request builder ──────────────

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        let header_value = format!("{}{}", self.auth_prefix, self.api_key);
        self.client
            .post(url)
            .header(&self.auth_header, &header_value)
            .header("Content-Type", "application/json")
    }

    fn effective_model(&self, req: &ChatRequest) -> String {
        req.model.clone().unwrap_or_else(|| self.chat_model.clone())
    }

    fn build_chat_body(&self, req: &ChatRequest) -> Value {
        let messages = util::attach_images(
            &self.id,
            &req.messages,
            &req.images,
            self.capabilities.supports_vision,
        );
        serde_json::json!({
            "model": self.effective_model(req),
            "messages": wire_messages(&req.system_prompt, &messages),
            "temperature": req.temperature.unwrap_or(self.temperature),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// System prompt first, then the labelled history in OpenAI shape.
///
/// Shared with the Hunyuan adapter, whose `Messages` array uses the same
/// element layout.
pub(crate) fn wire_messages(system_prompt: &str, messages: &[ChatMessage]) -> Vec<Value> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    out.push(serde_json::json!({ "role": "system", "content": system_prompt }));
    out.extend(messages.iter().map(msg_to_openai));
    out
}

fn msg_to_openai(msg: &ChatMessage) -> Value {
    let mut obj = serde_json::json!({
        "role": msg.role.as_str(),
        "content": content_to_openai(&msg.content),
    });
    if let Some(ref name) = msg.name {
        obj["name"] = Value::String(name.clone());
    }
    obj
}

fn content_to_openai(content: &MessageContent) -> Value {
    match content {
        MessageContent::Text(t) => Value::String(t.clone()),
        MessageContent::Parts(parts) => Value::Array(
            parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => serde_json::json!({ "type": "text", "text": text }),
                    ContentPart::Image { url } => {
                        serde_json::json!({ "type": "image_url", "image_url": { "url": url } })
                    }
                })
                .collect(),
        ),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_chat_response(provider: &str, body: &Value, requested_model: &str) -> Result<ChatResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first());

    let content = choice
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|v| v.as_str());

    let finish_reason = choice
        .and_then(|c| c.get("finish_reason"))
        .and_then(|v| v.as_str())
        .map(String::from);

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or(requested_model)
        .to_string();

    Ok(ChatResponse {
        content: util::non_empty(provider, content)?,
        model,
        finish_reason,
    })
}

/// `data[0].url` (downloaded by the caller) or `data[0].b64_json`.
enum GeneratedImage {
    Url(String),
    Inline(String),
}

fn parse_image_response(body: &Value) -> Option<GeneratedImage> {
    let first = body.get("data")?.as_array()?.first()?;
    if let Some(url) = first.get("url").and_then(|v| v.as_str()).filter(|u| !u.is_empty()) {
        return Some(GeneratedImage::Url(url.to_owned()));
    }
    first
        .get("b64_json")
        .and_then(|v| v.as_str())
        .map(|b64| GeneratedImage::Inline(format!("data:image/png;base64,{b64}")))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let model = self.effective_model(req);
        let body = self.build_chat_body(req);

        tracing::debug!(provider = %self.id, url = %url, model = %model, "openai_compat chat request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;
        let resp_text = util::check_status(&self.id, resp).await?;

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_chat_response(&self.id, &resp_json, &model)
    }

    async fn generate_image(&self, req: &ImageRequest) -> Result<ImageResponse> {
        let image = self.image.as_ref().ok_or_else(|| {
            Error::ImageGeneration(format!("provider {} has no image model configured", self.id))
        })?;
        let url = format!("{}/images/generations", self.base_url);
        let body = serde_json::json!({
            "model": image.model,
            "prompt": req.prompt,
            "size": image.size,
            "quality": image.quality,
        });

        tracing::debug!(provider = %self.id, model = %image.model, "image generation request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;
        let resp_text = util::check_status(&self.id, resp)
            .await
            .map_err(|e| Error::ImageGeneration(e.to_string()))?;
        let resp_json: Value = serde_json::from_str(&resp_text)?;

        let data_uri = match parse_image_response(&resp_json) {
            Some(GeneratedImage::Url(u)) => util::fetch_as_data_uri(&self.client, &u).await?,
            Some(GeneratedImage::Inline(d)) => d,
            None => {
                return Err(Error::ImageGeneration(format!(
                    "provider {} returned no image",
                    self.id
                )))
            }
        };
        Ok(ImageResponse { data_uri })
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        &self.id
    }

    fn model(&self) -> &str {
        &self.chat_model
    }
}
