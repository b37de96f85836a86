//! Configuration loading and validation for the checkmon daemon.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use validator::Validate;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analyzer: AnalyzerSettings,

    #[serde(default)]
    pub notifications: Vec<NotificationSettings>,

    #[serde(default)]
    pub state: StateSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        for notification in &self.notifications {
            match notification {
                NotificationSettings::Stdout => {}
                NotificationSettings::Ntfy(settings) => settings.validate()?,
                NotificationSettings::Twilio(settings) => settings.validate()?,
                NotificationSettings::Sendgrid(settings) => settings.validate()?,
            }
        }
        if let StateSettings::Sqlite(settings) = &self.state {
            settings.validate()?;
        }
        Ok(())
    }
}

/// Analysis CLI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerSettings {
    /// Set to true to disable the analyzer entirely. Checks that
    /// require it will fail until it is re-enabled.
    #[serde(default)]
    pub disabled: bool,

    /// Path to the analysis CLI binary.
    #[serde(default = "default_cli_path")]
    pub cli_path: String,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            disabled: false,
            cli_path: default_cli_path(),
        }
    }
}

fn default_cli_path() -> String {
    "claude".to_string()
}

/// One notification transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NotificationSettings {
    Stdout,
    Ntfy(NtfySettings),
    Twilio(TwilioSettings),
    Sendgrid(SendGridSettings),
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NtfySettings {
    #[validate(length(min = 1))]
    pub topic: String,

    pub server: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TwilioSettings {
    #[validate(length(min = 1))]
    pub account_sid: String,

    #[validate(length(min = 1))]
    pub auth_token: String,

    #[validate(length(min = 1))]
    pub from: String,

    #[validate(length(min = 1))]
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SendGridSettings {
    #[validate(length(min = 1))]
    pub api_key: String,

    #[validate(length(min = 1))]
    pub from: String,

    pub from_name: Option<String>,

    #[validate(length(min = 1))]
    pub to: String,
}

/// Alert state persistence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StateSettings {
    #[default]
    Memory,
    Sqlite(SqliteSettings),
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SqliteSettings {
    #[validate(length(min = 1))]
    pub db_path: String,
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("hardcoded pattern"));

impl Config {
    /// Load configuration from default search paths.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(&path)
            }
            None => {
                tracing::info!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, expanding `${VAR}`
    /// occurrences from the environment first.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in standard locations.
    fn find_config_file() -> Option<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/checkmon/checkmon.yaml")];

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./checkmon.yaml"));

        paths
            .into_iter()
            .find(|p: &PathBuf| p.exists() && p.is_file())
    }

    /// Get home directory config path.
    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/checkmon/checkmon.yaml"))
    }
}

/// Replace `${VAR}` with the environment value. Unset or empty
/// variables leave the original text in place.
fn expand_env_vars(contents: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(contents, |caps: &Captures| {
            match std::env::var(&caps[1]) {
                Ok(value) if !value.is_empty() => value,
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}
