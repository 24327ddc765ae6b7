pub mod catalog;
pub mod google;
pub mod hunyuan;
pub mod openai_compat;
pub mod registry;
pub mod retry;
pub mod traits;
pub(crate) mod util;

// Re-exports for convenience.
pub use registry::ProviderRegistry;
pub use retry::{with_retry, RetryPolicy};
pub use traits::{ChatRequest, ChatResponse, ImageRequest, ImageResponse, LlmProvider};
