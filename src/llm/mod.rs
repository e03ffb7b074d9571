//! Remote completion client.
//!
//! A single trait seam in front of the HTTP backend so the interactive loop
//! can be driven by a scripted client in tests.

pub mod openai;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

pub use openai::OpenAIClient;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{provider} API request failed with status {status}: {message}")]
    Api {
        provider: &'static str,
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("Empty response from {0}")]
    EmptyResponse(&'static str),
}

/// Anything that turns a prompt into generated text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send `prompt` and return the cleaned response text.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Model name, for logging.
    fn model(&self) -> &str;
}

/// Create the completion client described by the configuration.
pub fn create_client(
    config: &crate::config::Config,
    model_override: Option<&str>,
) -> Result<OpenAIClient> {
    let api_key = config.api_key()?;
    let model = model_override.unwrap_or(&config.model.name);
    OpenAIClient::new(model.to_string(), api_key, config.model.api_base.clone())
}

/// Clean up a generated response.
pub fn clean_response(response: &str) -> String {
    let mut text = response.trim().to_string();

    // Remove markdown code blocks if present
    if text.starts_with("```") {
        if let Some(first_newline) = text.find('\n') {
            text = text[first_newline + 1..].to_string();
        } else {
            text = text.trim_start_matches('`').to_string();
        }
        if let Some(end) = text.rfind("```") {
            text = text[..end].to_string();
        }
    }

    // Only a matching pair of surrounding backticks
    let text = text.trim();
    text.strip_prefix('`')
        .and_then(|t| t.strip_suffix('`'))
        .unwrap_or(text)
        .trim()
        .to_string()
}

/// First double-quoted segment of `text`, without the quotes.
pub fn extract_quoted(text: &str) -> Option<String> {
    let re = Regex::new(r#""([^"]+)""#).ok()?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Turn a model answer into a bare commit message.
///
/// Models sometimes answer with `git commit -m "..."` even when asked for the
/// message alone.
pub fn commit_message_from(response: &str) -> String {
    let cleaned = clean_response(response);
    if cleaned.starts_with("git ") {
        if let Some(message) = extract_quoted(&cleaned) {
            return message;
        }
    }
    cleaned
}
