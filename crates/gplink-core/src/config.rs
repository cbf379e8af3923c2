//! gplink Configuration Management
//!
//! Handles configuration from environment variables and TOML files
//! with defaults matching how global-pointer heads are trained.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Decoder configuration
    pub decode: DecodeConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply every key `lookup` returns a value for, over the current values
    fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(threshold) = lookup("GPLINK_THRESHOLD") {
            self.decode.threshold = parse_value("GPLINK_THRESHOLD", threshold)?;
        }
        if let Some(mode) = lookup("GPLINK_SUBJECT_END") {
            self.decode.subject_end = parse_value("GPLINK_SUBJECT_END", mode)?;
        }
        if let Some(prefix) = lookup("GPLINK_PREFIX_TOKENS") {
            self.decode.prefix_tokens = parse_value("GPLINK_PREFIX_TOKENS", prefix)?;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.json_format = format.eq_ignore_ascii_case("json");
        }

        self.validate()?;
        Ok(self)
    }

    /// Reject values no decoder can work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.decode.threshold.is_finite() {
            return Err(ConfigError::InvalidValue {
                key: "decode.threshold".to_string(),
                value: self.decode.threshold.to_string(),
            });
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Decoder configuration shared by all heads
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Scores strictly greater than this are positive.
    /// Global-pointer heads emit logits, so 0.0 is the decision boundary.
    pub threshold: f32,

    /// Which position fills the subject-end field of decoded triples
    pub subject_end: SubjectEnd,

    /// Leading special tokens (e.g. `[CLS]`) to strip when mapping back to text
    pub prefix_tokens: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            subject_end: SubjectEnd::default(),
            prefix_tokens: 1,
        }
    }
}

/// Source of the subject-end field in a decoded triple.
///
/// The published GPLinker decoding reports the subject head in both subject
/// fields. `Head` keeps that output; `Tail` reports the matched subject tail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectEnd {
    #[default]
    Head,
    Tail,
}

impl std::fmt::Display for SubjectEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Head => write!(f, "head"),
            Self::Tail => write!(f, "tail"),
        }
    }
}

impl std::str::FromStr for SubjectEnd {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "head" => Ok(Self::Head),
            "tail" => Ok(Self::Tail),
            _ => Err(ConfigError::InvalidValue {
                key: "subject_end".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
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
