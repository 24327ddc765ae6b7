//! Built-in table of known chat and image models.
//!
//! The gateway uses this to decide whether a chat model can take images.
//! Models missing from the table are assumed text-only unless the provider
//! entry sets `vision = true`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    pub provider: &'static str,
    pub id: &'static str,
    pub name: &'static str,
    pub supports_vision: bool,
}

const fn model(provider: &'static str, id: &'static str, name: &'static str, vision: bool) -> ModelInfo {
    ModelInfo {
        provider,
        id,
        name,
        supports_vision: vision,
    }
}

pub const CHAT_MODELS: &[ModelInfo] = &[
    model("zhipu", "glm-4.6v-flash", "GLM-4.6V-Flash", true),
    model("zhipu", "glm-4.7-flash", "GLM-4.7-Flash", false),
    model("zhipu", "glm-4v-flash", "GLM-4V-Flash", true),
    model("google", "gemma-3-27b-it", "Gemma 3 27B", true),
    model("google", "gemma-3-12b-it", "Gemma 3 12B", true),
    model("google", "gemini-2.0-flash", "Gemini 2.0 Flash", true),
    model("groq", "llama-3.3-70b-versatile", "Llama 3.3 70B", false),
    model("volcengine", "doubao-pro-32k", "Doubao Pro", false),
    model("modelscope", "qwen-max", "Qwen Max", false),
    model("tencent", "hunyuan-lite", "Hunyuan Lite", false),
    model("tencent", "hunyuan-standard", "Hunyuan Standard", false),
    model("tencent", "hunyuan-pro", "Hunyuan Pro", false),
];

pub fn lookup(provider: &str, model_id: &str) -> Option<&'static ModelInfo> {
    CHAT_MODELS
        .iter()
        .find(|m| m.provider == provider && m.id == model_id)
}

pub fn models_for(provider: &str) -> impl Iterator<Item = &'static ModelInfo> + '_ {
    CHAT_MODELS.iter().filter(move |m| m.provider == provider)
}

/// Vision support for a model: explicit override first, then the catalog.
pub fn supports_vision(provider: &str, model_id: &str, override_flag: Option<bool>) -> bool {
    override_flag.unwrap_or_else(|| lookup(provider, model_id).is_some_and(|m| m.supports_vision))
}
