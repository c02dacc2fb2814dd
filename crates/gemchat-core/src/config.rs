//! Configuration management for gemchat.
//!
//! Loads configuration from `${GEMCHAT_HOME}/config.toml` with sensible defaults.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Returns the default config template with comments.
///
/// Embedded from `default_config.toml` at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for gemchat configuration and data.
    //!
    //! `GEMCHAT_HOME` resolution order:
    //! 1. `GEMCHAT_HOME` environment variable (if set)
    //! 2. `~/.config/gemchat` (default)

    use std::path::PathBuf;

    /// Returns the gemchat home directory.
    pub fn gemchat_home() -> PathBuf {
        if let Ok(home) = std::env::var("GEMCHAT_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(".config")
            .join("gemchat")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        gemchat_home().join("config.toml")
    }

    /// Returns the path to the stored sign-in credentials.
    pub fn auth_path() -> PathBuf {
        gemchat_home().join("auth.json")
    }
}

/// Provider endpoint and credential overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key (falls back to the provider's environment variable).
    pub api_key: Option<String>,
    /// Base URL override (the environment variable wins when set).
    pub base_url: Option<String>,
}

/// Provider configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub gemini: ProviderConfig,
}

/// Chat input and sidebar limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of recent searches kept per session.
    pub recent_searches_limit: usize,
    /// Longest accepted message, in characters.
    pub max_input_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            recent_searches_limit: 5,
            max_input_chars: 4000,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` overrides it.
    pub level: String,
    /// Write logs to this file instead of stderr.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gemini model used for replies.
    pub model: String,

    /// Model retried once when the primary model is not found.
    pub fallback_model: Option<String>,

    /// Maximum tokens per reply.
    pub max_output_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,

    /// Send earlier turns of the session along with each message.
    pub include_history: bool,

    /// Provider configuration (API keys, base URLs).
    pub providers: ProvidersConfig,

    /// Identity provider (web API key, base URL).
    pub identity: ProviderConfig,

    pub chat: ChatConfig,

    pub logging: LoggingConfig,
}

impl Config {
    const DEFAULT_MODEL: &str = "gemini-1.5-flash";
    const DEFAULT_FALLBACK_MODEL: &str = "gemini-pro";
    const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;
    const DEFAULT_TEMPERATURE: f32 = 0.7;

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, default_config_template())
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: Self::DEFAULT_MODEL.to_string(),
            fallback_model: Some(Self::DEFAULT_FALLBACK_MODEL.to_string()),
            max_output_tokens: Self::DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: Self::DEFAULT_TEMPERATURE,
            include_history: false,
            providers: ProvidersConfig::default(),
            identity: ProviderConfig::default(),
            chat: ChatConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
