use serde::{Deserialize, Serialize};

/// Capabilities advertised by a {provider, model} pair.
///
/// The gateway consults `supports_vision` to decide whether attached images
/// are encoded into the last user turn, and `supports_image_generation` to
/// fail fast before calling an image endpoint that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LlmCapabilities {
    pub supports_vision: bool,
    pub supports_image_generation: bool,
}
