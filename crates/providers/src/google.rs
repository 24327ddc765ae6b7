//! Google Gemini adapter.
//!
//! Implements the Gemini `generateContent` API. Auth is via an API key passed
//! as a query parameter (`key={api_key}`). Gemini has no system role in this
//! API shape, so the persona prompt is sent as a leading user turn.

use crate::catalog;
use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use crate::util::{self, from_reqwest};
use pal_domain::capability::LlmCapabilities;
use pal_domain::chat::{ChatMessage, ContentPart, MessageContent, Role};
use pal_domain::config::ProviderConfig;
use pal_domain::error::{Error, Result};
use serde_json::Value;
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct GoogleProvider {
    id: String,
    base_url: String,
    api_key: String,
    chat_model: String,
    temperature: f32,
    capabilities: LlmCapabilities,
    client: reqwest::Client,
}

impl GoogleProvider {
    pub fn from_config(cfg: &ProviderConfig, timeout: Duration, temperature: f32) -> Result<Self> {
        let base_url = cfg.effective_base_url().ok_or_else(|| {
            Error::Config(format!("provider {}: base_url is required", cfg.id))
        })?;
        Ok(Self {
            id: cfg.id.clone(),
            base_url,
            api_key: util::resolve_api_key(&cfg.auth)?,
            chat_model: cfg.chat_model.clone(),
            temperature,
            capabilities: LlmCapabilities {
                supports_vision: catalog::supports_vision("google", &cfg.chat_model, cfg.vision),
                supports_image_generation: false,
            },
            client: util::build_client(timeout)?,
        })
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn generate_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        )
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        let messages = util::attach_images(
            &self.id,
            &req.messages,
            &req.images,
            self.capabilities.supports_vision,
        );
        let mut contents: Vec<Value> = Vec::with_capacity(messages.len() + 1);
        contents.push(serde_json::json!({
            "role": "user",
            "parts": [{ "text": format!("SYSTEM INSTRUCTION: {}", req.system_prompt) }],
        }));
        contents.extend(messages.iter().map(msg_to_gemini));

        serde_json::json!({
            "contents": contents,
            "generationConfig": { "temperature": req.temperature.unwrap_or(self.temperature) },
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn msg_to_gemini(msg: &ChatMessage) -> Value {
    let role = match msg.role {
        Role::Assistant => "model",
        Role::User | Role::System => "user",
    };
    let mut parts = content_to_gemini_parts(&msg.content);
    if msg.role == Role::System {
        if let Some(first) = parts.first_mut() {
            if let Some(text) = first.get("text").and_then(|t| t.as_str()) {
                *first = serde_json::json!({ "text": format!("SYSTEM: {text}") });
            }
        }
    }
    serde_json::json!({ "role": role, "parts": parts })
}

fn content_to_gemini_parts(content: &MessageContent) -> Vec<Value> {
    match content {
        MessageContent::Text(t) => vec![serde_json::json!({ "text": t })],
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|p| match p {
                ContentPart::Text { text } => serde_json::json!({ "text": text }),
                ContentPart::Image { url } => match util::split_data_uri(url) {
                    Some((mime, data)) => serde_json::json!({
                        "inline_data": { "mime_type": mime, "data": data }
                    }),
                    None => serde_json::json!({ "file_data": { "file_uri": url } }),
                },
            })
            .collect(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_gemini_response(provider: &str, body: &Value, model: &str) -> Result<ChatResponse> {
    let candidate = body
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first());

    let text: Option<String> = candidate
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|v| v.as_str()))
                .collect()
        });

    let finish_reason = candidate
        .and_then(|c| c.get("finishReason"))
        .and_then(|v| v.as_str())
        .map(|s| match s {
            "STOP" => "stop".to_string(),
            "MAX_TOKENS" => "length".to_string(),
            other => other.to_lowercase(),
        });

    Ok(ChatResponse {
        content: util::non_empty(provider, text.as_deref())?,
        model: model.to_string(),
        finish_reason,
    })
}

/// Redact API key from URL for safe logging.
fn redact_url_key(url: &str) -> String {
    if let Some(idx) = url.find("key=") {
        let prefix = &url[..idx + 4];
        let rest = &url[idx + 4..];
        let end = rest.find('&').unwrap_or(rest.len());
        format!("{prefix}[REDACTED]{}", &rest[end..])
    } else {
        url.to_string()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for GoogleProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let model = req.model.clone().unwrap_or_else(|| self.chat_model.clone());
        let url = self.generate_url(&model);
        let body = self.build_body(req);

        tracing::debug!(provider = %self.id, url = %redact_url_key(&url), "google chat request");

        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;
        let resp_text = util::check_status(&self.id, resp).await?;

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_gemini_response(&self.id, &resp_json, &model)
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
