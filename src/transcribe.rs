//! Speech-to-text client (OpenAI-compatible transcription endpoint).

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const TRANSCRIPTION_ENDPOINT: &str = "https://api.openai.com/v1/audio/transcriptions";
const DEFAULT_MODEL: &str = "whisper-1";

/// Errors from the transcription service boundary.
#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),
}

pub type Result<T> = std::result::Result<T, TranscribeError>;

/// Configuration for the transcription client.
#[derive(Debug, Clone)]
pub struct TranscribeConfig {
    /// API key for the transcription service.
    pub api_key: String,

    /// Model to use (defaults to whisper-1).
    pub model: Option<String>,

    /// Optional language hint (ISO 639-1 code, e.g. "en").
    pub language: Option<String>,
}

impl TranscribeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
            language: None,
        }
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Trait for transcription backends.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a WAV payload to plain text.
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String>;
}

/// Transcription API client.
#[derive(Debug, Clone)]
pub struct TranscribeClient {
    client: reqwest::Client,
    config: TranscribeConfig,
}

impl TranscribeClient {
    pub fn new(config: TranscribeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Transcriber for TranscribeClient {
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String> {
        debug!(
            model = self.config.model(),
            audio_bytes = audio.len(),
            language = ?self.config.language,
            "Sending transcription request"
        );

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("recording.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| TranscribeError::ApiError(e.to_string()))?,
            )
            .part(
                "model",
                reqwest::multipart::Part::text(self.config.model().to_string()),
            );

        if let Some(lang) = &self.config.language {
            form = form.part("language", reqwest::multipart::Part::text(lang.clone()));
        }

        let response = self
            .client
            .post(TRANSCRIPTION_ENDPOINT)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TranscribeError::ApiError(format!(
                "API returned {}: {}",
                status, body
            )));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| TranscribeError::TranscriptionFailed(e.to_string()))?;

        Ok(parsed.text)
    }
}
