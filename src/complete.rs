//! Chat-completion client for the augmented mode.
//!
//! The spoken transcript becomes the request; the text captured at session
//! start rides along in a fenced block so the model can tell context from
//! instruction. The system prompt pins the output style: the response is
//! pasted directly into whatever has focus, so it has to be insertable as-is.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const MAX_TOKENS: u32 = 4096;

const SYSTEM_PROMPT: &str = "You are a helpful assistant. The user may provide \
context (code, text, etc.) along with a spoken request. Respond concisely and \
directly - your response will be pasted into their editor or terminal.";

#[derive(Debug, Error)]
pub enum CompleteError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("completion response contained no choices")]
    EmptyResponse,
}

pub type Result<T> = std::result::Result<T, CompleteError>;

/// Configuration for the completion client. All fields are externally
/// supplied; validation (and mode disabling) happens at startup.
#[derive(Debug, Clone)]
pub struct CompleteConfig {
    /// API key for the completion service.
    pub api_key: String,

    /// Base URL of an OpenAI-compatible API, e.g. "https://api.example.com/v1".
    pub base_url: String,

    /// Model identifier.
    pub model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Combine the captured context and the transcribed instruction into the
/// user message. An empty context is omitted entirely.
pub fn build_user_message(context: &str, instruction: &str) -> String {
    if context.is_empty() {
        instruction.to_string()
    } else {
        format!(
            "Context:\n```\n{}\n```\n\nRequest: {}",
            context, instruction
        )
    }
}

/// Trait for completion backends.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Send context + instruction and return the model's reply.
    async fn complete(&self, context: &str, instruction: &str) -> Result<String>;
}

/// Chat-completion API client.
#[derive(Debug, Clone)]
pub struct CompleteClient {
    client: reqwest::Client,
    config: CompleteConfig,
}

impl CompleteClient {
    pub fn new(config: CompleteConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Completer for CompleteClient {
    /// Returns the top choice's text.
    async fn complete(&self, context: &str, instruction: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            max_tokens: MAX_TOKENS,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_user_message(context, instruction),
                },
            ],
        };

        debug!(
            model = %self.config.model,
            context_bytes = context.len(),
            "Sending completion request"
        );

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompleteError::ApiError(format!(
                "API returned {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompleteError::ApiError(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(CompleteError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_with_context() {
        let msg = build_user_message("def foo():\n    pass", "add a docstring");
        assert_eq!(
            msg,
            "Context:\n```\ndef foo():\n    pass\n```\n\nRequest: add a docstring"
        );
    }

    #[test]
    fn test_user_message_without_context() {
        assert_eq!(build_user_message("", "hello world"), "hello world");
    }

    #[test]
    fn test_chat_response_takes_top_choice() {
        let json = r#"{"choices":[
            {"message":{"role":"assistant","content":"first"}},
            {"message":{"role":"assistant","content":"second"}}
        ]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content, "first");
    }
}
