/// Shared error type used across all palchat crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// Non-2xx response from a model backend. Carries the response body.
    #[error("provider {provider}: HTTP {status} - {body}")]
    Provider {
        provider: String,
        status: u16,
        body: String,
    },

    /// The backend answered 2xx but the assistant content was empty or null.
    #[error("provider {provider} returned an empty response")]
    EmptyResponse { provider: String },

    #[error("image generation: {0}")]
    ImageGeneration(String),

    #[error("config: {0}")]
    Config(String),

    #[error("store: {0}")]
    Store(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether a call-site retry policy may re-attempt after this error.
    ///
    /// Configuration problems, missing records and 4xx rejections are
    /// permanent. 5xx, 408/429, empty completions and transport errors are
    /// transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Provider { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Error::EmptyResponse { .. } | Error::Http(_) | Error::Timeout(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
