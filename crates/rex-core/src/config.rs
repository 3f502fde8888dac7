//! Rex Configuration Management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for interactive sessions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Bootstrap loop configuration
    pub bootstrap: BootstrapConfig,

    /// Corpus location
    pub corpus: CorpusConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Overwrite every field whose variable `lookup` returns
    fn apply_env(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        // Bootstrap
        if let Some(size) = lookup("REX_BATCH_SIZE") {
            self.bootstrap.batch_size = parse_var("REX_BATCH_SIZE", size)?;
        }
        if let Some(value) = lookup("REX_ACCEPT_THRESHOLD") {
            self.bootstrap.accept_threshold = parse_var("REX_ACCEPT_THRESHOLD", value)?;
        }
        if let Some(value) = lookup("REX_REJECT_THRESHOLD") {
            self.bootstrap.reject_threshold = parse_var("REX_REJECT_THRESHOLD", value)?;
        }

        // Corpus
        if let Some(path) = lookup("REX_CORPUS_PATH") {
            self.corpus.path = Some(PathBuf::from(path));
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("LOG_JSON") {
            self.logging.json_format = parse_var("LOG_JSON", json)?;
        }

        Ok(self)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::ParseError { message, .. } => ConfigError::ParseError { path, message },
            other => other,
        })
    }

    /// Parse TOML content
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(self) -> Result<Self, ConfigError> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bootstrap.validate()
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Bootstrap loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Maximum number of questions per iteration
    pub batch_size: usize,

    /// Scores at or above this are accepted without asking
    pub accept_threshold: f64,

    /// Scores at or below this are not worth asking about
    pub reject_threshold: f64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            accept_threshold: 0.9,
            reject_threshold: 0.1,
        }
    }
}

impl BootstrapConfig {
    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "bootstrap.batch_size".to_string(),
                value: "0".to_string(),
            });
        }
        for (key, value) in [
            ("bootstrap.accept_threshold", self.accept_threshold),
            ("bootstrap.reject_threshold", self.reject_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                });
            }
        }
        if self.reject_threshold >= self.accept_threshold {
            return Err(ConfigError::InvalidValue {
                key: "bootstrap.reject_threshold".to_string(),
                value: format!(
                    "{} (must be below accept_threshold {})",
                    self.reject_threshold, self.accept_threshold
                ),
            });
        }
        Ok(())
    }
}

/// Corpus location
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CorpusConfig {
    /// JSON file holding the preprocessed documents
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
