//! Turnstile configuration file handling.
//!
//! Operator settings only: where the bot token lives, where bot state is
//! stored, and logging. The membership policy, owner set and delay are bot
//! state, managed at runtime through the owner commands, not here.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

/// Turnstile bot configuration (operator settings only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Telegram connection settings
    pub telegram: TelegramConfig,

    /// Bot state storage
    #[serde(default)]
    pub state: StateConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Telegram-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Path to a file containing the bot token (container-native; keeps the
    /// token out of the config file itself)
    pub token_file: PathBuf,

    /// Numeric user id seeded as the first owner when the state file has
    /// no owners yet
    pub initial_owner: i64,
}

/// Bot state storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Path to the JSON state file
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

fn default_state_path() -> PathBuf {
    data_dir().join("state.json")
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("turnstile")
}

impl TurnstileConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: TurnstileConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        Ok(config)
    }

    /// Read the bot token from the configured token file.
    pub fn read_token(&self) -> Result<String, Box<dyn std::error::Error>> {
        let token = fs::read_to_string(&self.telegram.token_file).map_err(|e| {
            format!(
                "Failed to read token file '{}': {}",
                self.telegram.token_file.display(),
                e
            )
        })?;
        let token = token.trim().to_string();
        if token.is_empty() {
            return Err(format!(
                "Token file '{}' is empty",
                self.telegram.token_file.display()
            )
            .into());
        }
        Ok(token)
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml() -> String {
        format!(
            r#"# Turnstile Bot Configuration (Operator Settings)
#
# This file contains OPERATOR configuration only - deployment settings.
# The membership policy, owner list and approval delay are bot state,
# managed at runtime through the /owner commands.

[telegram]
# Path to a file containing the bot token from @BotFather.
# Keeping it in a separate file keeps secrets out of this config.
token_file = "{token_file}"

# Numeric Telegram user id seeded as the first owner.
# Further owners are managed at runtime with /addowner and /removeowner.
initial_owner = 0

[state]
# Path to the JSON bot state file (policy, owners, subscribers, delay)
path = "{state_path}"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"
"#,
            token_file = data_dir().join("token.txt").display(),
            state_path = default_state_path().display(),
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = Self::generate_default_toml();

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(config_path, contents).map_err(|e| {
            format!(
                "Failed to write config file '{}': {}",
                config_path.display(),
                e
            )
        })?;

        Ok(())
    }
}

/// Default config file path: ~/.local/share/turnstile/config.toml
pub fn default_config_path() -> PathBuf {
    data_dir().join("config.toml")
}
