//! Tencent Hunyuan adapter.
//!
//! Same message layout as OpenAI but wrapped in a capitalised envelope
//! (`Model`, `Messages`, `Temperature`). Responses come back as
//! `Choices[0].Message.Content`; some gateways answer in lowercase, so both
//! shapes are accepted.

use crate::catalog;
use crate::openai_compat::wire_messages;
use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use crate::util::{self, from_reqwest};
use pal_domain::capability::LlmCapabilities;
use pal_domain::config::ProviderConfig;
use pal_domain::error::{Error, Result};
use serde_json::Value;
use std::time::Duration;

pub struct HunyuanProvider {
    id: String,
    base_url: String,
    api_key: String,
    chat_model: String,
    temperature: f32,
    capabilities: LlmCapabilities,
    client: reqwest::Client,
}

impl HunyuanProvider {
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
                supports_vision: catalog::supports_vision(&cfg.id, &cfg.chat_model, cfg.vision),
                supports_image_generation: false,
            },
            client: util::build_client(timeout)?,
        })
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        let messages = util::attach_images(
            &self.id,
            &req.messages,
            &req.images,
            self.capabilities.supports_vision,
        );
        serde_json::json!({
            "Model": req.model.as_deref().unwrap_or(&self.chat_model),
            "Messages": wire_messages(&req.system_prompt, &messages),
            "Temperature": req.temperature.unwrap_or(self.temperature),
        })
    }
}

fn parse_response(provider: &str, body: &Value) -> Result<String> {
    let upper = body
        .pointer("/Choices/0/Message/Content")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty());
    let lower = || body.pointer("/choices/0/message/content").and_then(|v| v.as_str());
    util::non_empty(provider, upper.or_else(lower))
}

#[async_trait::async_trait]
impl LlmProvider for HunyuanProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(req);

        tracing::debug!(provider = %self.id, url = %url, "hunyuan chat request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;
        let resp_text = util::check_status(&self.id, resp).await?;
        let resp_json: Value = serde_json::from_str(&resp_text)?;

        Ok(ChatResponse {
            content: parse_response(&self.id, &resp_json)?,
            model: req.model.clone().unwrap_or_else(|| self.chat_model.clone()),
            finish_reason: resp_json
                .pointer("/Choices/0/FinishReason")
                .and_then(|v| v.as_str())
                .map(String::from),
        })
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
