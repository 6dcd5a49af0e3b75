//! Configuration
//!
//! Typed configuration loaded from a JSON5 file. Every field has a default,
//! so a missing file or a partial one is fine.

use crate::polls::MAX_OPTIONS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that overrides the config file location
pub const CONFIG_PATH_ENV: &str = "TALLY_CONFIG_PATH";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub polls: PollsConfig,
    pub console: ConsoleConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// Log level or filter directive (error, warn, info, debug, trace)
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Poll limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollsConfig {
    /// Most options a draft may have (capped at the hard limit)
    pub max_options: usize,
}

impl Default for PollsConfig {
    fn default() -> Self {
        Self {
            max_options: MAX_OPTIONS,
        }
    }
}

/// Identity used by the console transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsoleConfig {
    pub user_id: String,
    pub chat_id: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            user_id: "local-user".to_string(),
            chat_id: "local-chat".to_string(),
        }
    }
}

impl Config {
    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polls.max_options < 2 || self.polls.max_options > MAX_OPTIONS {
            return Err(ConfigError::Invalid(format!(
                "polls.maxOptions must be between 2 and {}, got {}",
                MAX_OPTIONS, self.polls.max_options
            )));
        }
        if self.console.user_id.trim().is_empty() {
            return Err(ConfigError::Invalid("console.userId is empty".to_string()));
        }
        if self.console.chat_id.trim().is_empty() {
            return Err(ConfigError::Invalid("console.chatId is empty".to_string()));
        }
        Ok(())
    }
}

/// Resolve the config file path: `TALLY_CONFIG_PATH`, else
/// `<config dir>/tally/tally.json5`.
pub fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tally")
        .join("tally.json5")
}

/// Load the configuration from the resolved path
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&get_config_path())
}

/// Load and validate the configuration at `path`. A missing file yields the
/// defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let config = parse_config(&raw).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })?;
    config.validate()?;
    Ok(config)
}

fn parse_config(raw: &str) -> Result<Config, String> {
    if raw.trim().is_empty() {
        return Ok(Config::default());
    }
    json5::from_str::<Config>(raw).map_err(|e| e.to_string())
}
