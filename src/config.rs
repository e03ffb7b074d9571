//! Configuration management for commitgpt.
//!
//! Configuration is loaded from `~/.config/commitgpt/config.toml`, or from the
//! path in `COMMITGPT_CONFIG` when set.

use crate::prompt::DEFAULT_INSTRUCTION;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "COMMITGPT_CONFIG";

/// Environment variable used when no key is stored in the config file.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No API key configured. Run `commitgpt auth` or set OPENAI_API_KEY.")]
    MissingApiKey,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Stored credentials.
    #[serde(default)]
    pub api_key: ApiKey,
    /// Custom instruction text.
    #[serde(default)]
    pub prompt: PromptSettings,
    /// Model and endpoint settings.
    #[serde(default)]
    pub model: ModelSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptSettings {
    /// Replaces the default instruction when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
}

/// Settings for the completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Model name (default: gpt-4o-mini).
    #[serde(default = "default_model")]
    pub name: String,
    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Diffs longer than this are truncated before being sent.
    #[serde(default = "default_max_diff_chars")]
    pub max_diff_chars: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            name: default_model(),
            api_base: default_api_base(),
            max_diff_chars: default_max_diff_chars(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_max_diff_chars() -> usize {
    12_000
}

impl Config {
    /// Get the config directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("commitgpt"))
            .context("Could not determine config directory")
    }

    /// Get the config file path.
    pub fn config_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, using defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save configuration to `path`, creating its directory.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// The API key from the config file, falling back to the environment.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        self.api_key
            .key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
            .ok_or(ConfigError::MissingApiKey)
    }

    /// The instruction placed at the top of every prompt.
    pub fn instruction(&self) -> &str {
        match self.prompt.custom.as_deref() {
            Some(custom) if !custom.trim().is_empty() => custom,
            _ => DEFAULT_INSTRUCTION,
        }
    }
}

/// Build the stored custom prompt from what the user typed during `auth`.
///
/// The default instruction is always appended so the model still knows it is
/// writing a commit message for a diff.
pub fn compose_custom_prompt(input: &str) -> String {
    let input = input.trim();
    if input.is_empty() {
        DEFAULT_INSTRUCTION.to_string()
    } else {
        format!("{}, {}", input, DEFAULT_INSTRUCTION)
    }
}
