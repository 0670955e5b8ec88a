//! Module for accessing, saving, and loading configuration files.
//!
//! Configuration is read once at startup and never reloaded. Missing
//! credentials disable the corresponding mode with a user-visible warning
//! instead of failing startup.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::chord::Chord;
use crate::complete::CompleteConfig;
use crate::session::Hotkeys;
use crate::transcribe::TranscribeConfig;
use crate::APP_NAME;

const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// Configuration structure for the application.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// API key for the transcription service. Required for both modes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    openai_key: Option<String>,

    /// Transcription model override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<String>,

    /// Preferred language hint for transcription.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    language: Option<String>,

    /// API key for the completion service (assistant mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    llm_key: Option<String>,

    /// Base URL of an OpenAI-compatible completion API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    llm_base_url: Option<String>,

    /// Completion model identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    llm_model: Option<String>,

    /// Chord that starts a plain transcription session.
    #[serde(
        default = "default_transcribe_hotkey",
        skip_serializing_if = "Config::is_default_transcribe_hotkey"
    )]
    transcribe_hotkey: Vec<String>,

    /// Chord that starts an assistant session (clipboard context + speech).
    #[serde(
        default = "default_augmented_hotkey",
        skip_serializing_if = "Config::is_default_augmented_hotkey"
    )]
    augmented_hotkey: Vec<String>,
}

fn default_transcribe_hotkey() -> Vec<String> {
    vec!["cmd".to_string(), "shift".to_string(), "z".to_string()]
}

fn default_augmented_hotkey() -> Vec<String> {
    vec!["cmd".to_string(), "shift".to_string(), "a".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_key: None,
            model: None,
            language: None,
            llm_key: None,
            llm_base_url: None,
            llm_model: None,
            transcribe_hotkey: default_transcribe_hotkey(),
            augmented_hotkey: default_augmented_hotkey(),
        }
    }
}

impl Config {
    /// Retrieves the transcription API key, if set.
    pub fn key_openai(&self) -> Option<&str> {
        self.openai_key.as_deref()
    }

    /// Sets a new transcription API key.
    #[allow(unused)]
    pub fn set_key_openai(&mut self, key: &str) {
        self.openai_key = Some(key.to_owned());
    }

    fn is_default_transcribe_hotkey(hotkey: &[String]) -> bool {
        hotkey == default_transcribe_hotkey()
    }

    fn is_default_augmented_hotkey(hotkey: &[String]) -> bool {
        hotkey == default_augmented_hotkey()
    }

    /// Client configuration for the transcription service, when credentials
    /// are present.
    pub fn transcribe_config(&self) -> Option<TranscribeConfig> {
        let key = self.openai_key.as_ref()?;
        Some(TranscribeConfig {
            api_key: key.clone(),
            model: self.model.clone(),
            language: self.language.clone(),
        })
    }

    /// Client configuration for the completion service, when credentials
    /// are present.
    pub fn complete_config(&self) -> Option<CompleteConfig> {
        let (key, base_url) = match (&self.llm_key, &self.llm_base_url) {
            (Some(key), Some(base_url)) => (key, base_url),
            _ => return None,
        };
        Some(CompleteConfig {
            api_key: key.clone(),
            base_url: base_url.clone(),
            model: self
                .llm_model
                .clone()
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
        })
    }

    /// Resolve the configured chords, disabling any mode whose credentials
    /// are missing or whose chord does not parse. Warnings surface as
    /// notifications via the notification layer.
    pub fn hotkeys(&self) -> Hotkeys {
        let parse = |names: &[String], what: &str| match Chord::parse(names) {
            Ok(chord) => Some(chord),
            Err(e) => {
                warn!("Invalid {} hotkey in config ({}); {} disabled", what, e, what);
                None
            }
        };

        let transcribe = if self.openai_key.is_some() {
            parse(&self.transcribe_hotkey, "transcribe")
        } else {
            warn!(
                "Transcription API key is not set; dictation is disabled. \
                 Set openai_key in the config file."
            );
            None
        };

        let augmented = if self.openai_key.is_none() {
            // Already warned above; assistant mode needs transcription too.
            None
        } else if self.complete_config().is_some() {
            parse(&self.augmented_hotkey, "assistant")
        } else {
            warn!(
                "Completion API is not configured; assistant mode is disabled. \
                 Set llm_key and llm_base_url in the config file."
            );
            None
        };

        Hotkeys {
            transcribe,
            augmented,
        }
    }
}

/// Manages loading and saving the configuration.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Creates a new `ConfigManager` with the default configuration directory.
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Creates a new `ConfigManager` with a specified configuration directory.
    /// Useful for testing with temporary directories.
    #[cfg(test)]
    pub fn with_config_dir<P: AsRef<std::path::Path>>(dir: P) -> Self {
        let config_path = dir.as_ref().join(format!("{}.toml", APP_NAME));
        Self { config_path }
    }

    /// Determines the default path to the configuration file.
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to retrieve configuration directory")?;
        Ok(config_dir.join(APP_NAME).join(format!("{}.toml", APP_NAME)))
    }

    /// Loads the configuration from the config file or returns the default.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }
        let config_content = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file at {:?}", self.config_path))?;
        let config: Config = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file at {:?}", self.config_path))?;
        Ok(config)
    }

    /// Saves the configuration, only writing non-default fields.
    pub fn save(&self, config: &Config) -> Result<()> {
        let config_dir = self
            .config_path
            .parent()
            .with_context(|| format!("Failed to get parent directory of {:?}", self.config_path))?;

        fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create config directory at {:?}", config_dir))?;

        let serialized =
            toml::to_string_pretty(&config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, serialized)
            .with_context(|| format!("Failed to write config file at {:?}", self.config_path))?;

        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path(&self) -> &std::path::Path {
        &self.config_path
    }
}
