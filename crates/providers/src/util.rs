//! Shared utility functions for provider adapters.

use base64::Engine;
use pal_domain::chat::{ChatMessage, Role};
use pal_domain::config::AuthConfig;
use pal_domain::error::{Error, Result};
use std::time::Duration;

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve the API key from an [`AuthConfig`].
///
/// Precedence:
/// 1. `key` field (plaintext, warns)
/// 2. `env` field (reads environment variable)
/// 3. Error
pub fn resolve_api_key(auth: &AuthConfig) -> Result<String> {
    if let Some(ref key) = auth.key {
        tracing::warn!(
            "API key loaded from plaintext config field 'key'; prefer 'env' instead"
        );
        return Ok(key.clone());
    }

    if let Some(ref env_var) = auth.env {
        return match std::env::var(env_var) {
            Ok(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(Error::Config(format!(
                "environment variable '{env_var}' not set or empty"
            ))),
        };
    }

    Err(Error::Config(
        "no API key configured: set 'key' or 'env' in the provider's auth table".into(),
    ))
}

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(from_reqwest)
}

/// Turn a non-2xx response into [`Error::Provider`], keeping the body.
pub(crate) async fn check_status(provider: &str, resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    let text = resp.text().await.map_err(from_reqwest)?;
    if !status.is_success() {
        return Err(Error::Provider {
            provider: provider.to_owned(),
            status: status.as_u16(),
            body: text,
        });
    }
    Ok(text)
}

/// Trim the assistant text, mapping empty output to [`Error::EmptyResponse`].
pub(crate) fn non_empty(provider: &str, content: Option<&str>) -> Result<String> {
    match content.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_owned()),
        _ => Err(Error::EmptyResponse {
            provider: provider.to_owned(),
        }),
    }
}

/// Encode images into the last user turn when the model can see them.
pub(crate) fn attach_images(
    provider: &str,
    messages: &[ChatMessage],
    images: &[String],
    supports_vision: bool,
) -> Vec<ChatMessage> {
    let mut out = messages.to_vec();
    if images.is_empty() {
        return out;
    }
    if !supports_vision {
        tracing::debug!(provider, count = images.len(), "model lacks vision, dropping images");
        return out;
    }
    match out.last_mut() {
        Some(last) if last.role == Role::User => {
            *last = last.clone().with_images(images);
        }
        _ => {
            tracing::debug!(provider, "last turn is not a user turn, dropping images");
        }
    }
    out
}

/// Split `data:<mime>;base64,<payload>` into `(mime, payload)`.
pub(crate) fn split_data_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    Some((mime, payload))
}

/// Download `url` and inline it as a `data:` URI.
pub(crate) async fn fetch_as_data_uri(client: &reqwest::Client, url: &str) -> Result<String> {
    let resp = client.get(url).send().await.map_err(from_reqwest)?;
    if !resp.status().is_success() {
        return Err(Error::ImageGeneration(format!(
            "image download failed: HTTP {}",
            resp.status().as_u16()
        )));
    }
    let mime = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_owned())
        .filter(|v| v.starts_with("image/"))
        .unwrap_or_else(|| "image/png".to_owned());
    let bytes = resp.bytes().await.map_err(from_reqwest)?;
    Ok(encode_data_uri(&mime, &bytes))
}

pub(crate) fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{b64}")
}
