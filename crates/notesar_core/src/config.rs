//! Coordinator configuration.
//!
//! # Responsibility
//! - Define the tunables the host passes when starting a session.
//! - Validate them once, before any collaborator is built.
//!
//! # Invariants
//! - `grouping_key` is non-empty and contains neither `|` nor `/`.
//! - `scan_poll_interval_ms` is non-zero; `scan_threshold` is finite and positive.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const DEFAULT_GROUPING_KEY: &str = "helloworld";
pub const DEFAULT_NOTE_PROPERTY_KEY: &str = "note";
pub const DEFAULT_SCAN_THRESHOLD: f32 = 1.0;
pub const DEFAULT_SCAN_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;

/// Characters that would corrupt the directory path or pipe-delimited body.
pub(crate) const RESERVED_KEY_CHARS: [char; 2] = ['|', '/'];

/// Session configuration supplied by the host shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Sharing directory base, e.g. `https://host/api/anchors`.
    pub directory_url: String,
    /// Partition key used for both listing and registering identifiers.
    pub grouping_key: String,
    /// Cloud anchor property that carries the note text.
    pub note_property_key: String,
    /// Scan quality at which an anchor may be uploaded.
    pub scan_threshold: f32,
    /// Upper bound between two scan-quality checks.
    pub scan_poll_interval_ms: u64,
    /// `None` waits for scan quality indefinitely.
    pub scan_timeout_ms: Option<u64>,
    pub http_timeout_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            directory_url: String::new(),
            grouping_key: DEFAULT_GROUPING_KEY.to_string(),
            note_property_key: DEFAULT_NOTE_PROPERTY_KEY.to_string(),
            scan_threshold: DEFAULT_SCAN_THRESHOLD,
            scan_poll_interval_ms: DEFAULT_SCAN_POLL_INTERVAL_MS,
            scan_timeout_ms: None,
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
        }
    }
}

impl CoordinatorConfig {
    /// Default configuration pointing at `directory_url`.
    pub fn with_directory(directory_url: impl Into<String>) -> Self {
        Self {
            directory_url: directory_url.into(),
            ..Self::default()
        }
    }

    /// Parses and validates a JSON document.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.directory_url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingDirectoryUrl);
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidDirectoryUrl(url.to_string()));
        }
        if self.grouping_key.trim().is_empty()
            || self.grouping_key.contains(RESERVED_KEY_CHARS)
        {
            return Err(ConfigError::InvalidGroupingKey(self.grouping_key.clone()));
        }
        if self.note_property_key.trim().is_empty() {
            return Err(ConfigError::EmptyNotePropertyKey);
        }
        if !self.scan_threshold.is_finite() || self.scan_threshold <= 0.0 {
            return Err(ConfigError::InvalidScanThreshold(self.scan_threshold));
        }
        if self.scan_poll_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("scan_poll_interval_ms"));
        }
        if self.scan_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroDuration("scan_timeout_ms"));
        }
        if self.http_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("http_timeout_ms"));
        }
        Ok(())
    }

    pub fn scan_poll_interval(&self) -> Duration {
        Duration::from_millis(self.scan_poll_interval_ms)
    }

    pub fn scan_timeout(&self) -> Option<Duration> {
        self.scan_timeout_ms.map(Duration::from_millis)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

/// Configuration rejected before a session starts.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Parse(String),
    MissingDirectoryUrl,
    InvalidDirectoryUrl(String),
    InvalidGroupingKey(String),
    EmptyNotePropertyKey,
    InvalidScanThreshold(f32),
    ZeroDuration(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "invalid config document: {message}"),
            Self::MissingDirectoryUrl => write!(f, "directory_url is required"),
            Self::InvalidDirectoryUrl(value) => {
                write!(f, "directory_url must be http(s), got `{value}`")
            }
            Self::InvalidGroupingKey(value) => write!(
                f,
                "grouping_key must be non-empty without `|` or `/`, got `{value}`"
            ),
            Self::EmptyNotePropertyKey => write!(f, "note_property_key cannot be empty"),
            Self::InvalidScanThreshold(value) => {
                write!(f, "scan_threshold must be finite and positive, got {value}")
            }
            Self::ZeroDuration(field) => write!(f, "{field} must be greater than zero"),
        }
    }
}

impl Error for ConfigError {}
