use pal_domain::capability::LlmCapabilities;
use pal_domain::chat::ChatMessage;
use pal_domain::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic chat completion request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Persona instructions. Each adapter decides where they go on the wire.
    pub system_prompt: String,
    /// Labelled history, oldest first. The last entry is usually the user turn.
    pub messages: Vec<ChatMessage>,
    /// Inline images for the last user turn. Dropped when the model has no
    /// vision support.
    pub images: Vec<String>,
    /// Sampling temperature. `None` uses the provider's configured value.
    pub temperature: Option<f32>,
    /// Model identifier override. When `None`, the provider uses its chat model.
    pub model: Option<String>,
}

impl ChatRequest {
    pub fn new(system_prompt: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages,
            ..Default::default()
        }
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

/// A provider-agnostic chat completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Trimmed assistant text. Never empty: adapters return
    /// [`Error::EmptyResponse`] instead.
    pub content: String,
    /// The model that actually produced the response.
    pub model: String,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
}

#[derive(Debug, Clone)]
pub struct ImageResponse {
    /// `data:<mime>;base64,...`
    pub data_uri: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait that every LLM adapter must implement.
///
/// Implementations translate between [`ChatRequest`] and the wire format of
/// one provider family (OpenAI-compatible, Tencent Hunyuan, Google Gemini).
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request and wait for the full response.
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse>;

    /// Generate one image and return it inlined.
    async fn generate_image(&self, _req: &ImageRequest) -> Result<ImageResponse> {
        Err(Error::ImageGeneration(format!(
            "provider {} does not support image generation",
            self.provider_id()
        )))
    }

    /// The advertised capabilities of this provider/model combination.
    fn capabilities(&self) -> &LlmCapabilities;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;

    /// Chat model used when the request does not override it.
    fn model(&self) -> &str;
}
