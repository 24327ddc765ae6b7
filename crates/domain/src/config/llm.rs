use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider system
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// API roots for the built-in provider ids. A provider entry without an
/// explicit `base_url` falls back to this table.
pub const DEFAULT_ENDPOINTS: &[(&str, &str)] = &[
    ("zhipu", "https://open.bigmodel.cn/api/paas/v4"),
    ("google", "https://generativelanguage.googleapis.com/v1beta"),
    ("groq", "https://api.groq.com/openai/v1"),
    ("volcengine", "https://ark.cn-beijing.volces.com/api/v3"),
    ("modelscope", "https://api.modelscope.cn/api/v1"),
    ("tencent", "https://hunyuan.tencentcloudapi.com"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider id used for chat replies.
    #[serde(default)]
    pub active_provider: Option<String>,
    /// Provider id used for image generation.
    #[serde(default = "d_zhipu")]
    pub image_provider: String,
    /// Honour `[GEN_IMAGE: ...]` directives in replies.
    #[serde(default = "d_true")]
    pub image_generation: bool,
    /// Client-side request timeout applied to every backend call.
    #[serde(default = "d_60000u")]
    pub timeout_ms: u64,
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    /// Registered providers (data-driven: adding a provider = adding config).
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            active_provider: None,
            image_provider: d_zhipu(),
            image_generation: true,
            timeout_ms: 60_000,
            temperature: d_temperature(),
            providers: Vec::new(),
        }
    }
}

impl LlmConfig {
    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    /// Wire protocol. Inferred from `id` when omitted.
    #[serde(default)]
    pub kind: Option<ProviderKind>,
    /// API root; the adapter appends its own path.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub auth: AuthConfig,
    pub chat_model: String,
    /// Overrides the catalog's vision flag for `chat_model`.
    #[serde(default)]
    pub vision: Option<bool>,
    /// Image endpoint settings. `zhipu` gets the defaults when omitted;
    /// any other provider without this table cannot generate images.
    #[serde(default)]
    pub image: Option<ImageModelConfig>,
}

impl ProviderConfig {
    pub fn kind(&self) -> ProviderKind {
        self.kind.unwrap_or_else(|| ProviderKind::infer(&self.id))
    }

    pub fn image_settings(&self) -> Option<ImageModelConfig> {
        match &self.image {
            Some(cfg) => Some(cfg.clone()),
            None if self.id == "zhipu" => Some(ImageModelConfig::default()),
            None => None,
        }
    }

    /// Configured base URL without a trailing slash, or the built-in default.
    pub fn effective_base_url(&self) -> Option<String> {
        match self.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => Some(url.trim_end_matches('/').to_owned()),
            None => default_endpoint(&self.id).map(str::to_owned),
        }
    }
}

pub fn default_endpoint(provider_id: &str) -> Option<&'static str> {
    DEFAULT_ENDPOINTS
        .iter()
        .find(|(id, _)| *id == provider_id)
        .map(|(_, url)| *url)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenaiCompat,
    Hunyuan,
    Google,
}

impl ProviderKind {
    pub fn infer(provider_id: &str) -> Self {
        match provider_id {
            "google" | "gemini" => ProviderKind::Google,
            "tencent" | "hunyuan" => ProviderKind::Hunyuan,
            _ => ProviderKind::OpenaiCompat,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Header name (default "Authorization").
    #[serde(default)]
    pub header: Option<String>,
    /// Header value prefix (default "Bearer ").
    #[serde(default)]
    pub prefix: Option<String>,
    /// Env var containing the key.
    #[serde(default)]
    pub env: Option<String>,
    /// Direct key (for config-only setups; prefer env).
    #[serde(default)]
    pub key: Option<String>,
}

/// Settings for the provider's `/images/generations` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageModelConfig {
    #[serde(default = "d_image_model")]
    pub model: String,
    #[serde(default = "d_image_size")]
    pub size: String,
    #[serde(default = "d_image_quality")]
    pub quality: String,
}

impl Default for ImageModelConfig {
    fn default() -> Self {
        Self {
            model: d_image_model(),
            size: d_image_size(),
            quality: d_image_quality(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_zhipu() -> String {
    "zhipu".into()
}
fn d_true() -> bool {
    true
}
fn d_60000u() -> u64 {
    60_000
}
fn d_temperature() -> f32 {
    0.8
}
fn d_image_model() -> String {
    "cogview-3-flash".into()
}
fn d_image_size() -> String {
    "1280x1280".into()
}
fn d_image_quality() -> String {
    "hd".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
