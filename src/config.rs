//! Configuration file parser for `blogroll.toml`.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys do not fail the load; each one is logged as a warning.
use crate::feed::{DateFormat, FetchSettings, FetchStrategy, InvalidDateFormat};
use crate::output::SerializerOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value: {0}")]
    DateFormat(#[from] InvalidDateFormat),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Text file listing feed sources.
    pub feeds_file: PathBuf,

    /// Maximum simultaneous feed fetches. 0 = fetch sequentially.
    pub concurrency: usize,

    /// Per-feed retrieval timeout in seconds.
    pub request_timeout_secs: u64,

    /// Deadline for a whole aggregation pass in seconds. 0 = no deadline.
    pub aggregation_timeout_secs: u64,

    /// Largest accepted feed document in bytes.
    pub max_feed_bytes: usize,

    /// Allow feeds on localhost and private networks.
    pub allow_private_hosts: bool,

    /// `strftime` pattern for post dates.
    pub date_format: String,

    /// Spaces per indentation level in JSON output.
    pub indent: usize,

    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        let fetch = FetchSettings::default();
        Self {
            feeds_file: PathBuf::from("BlogsFeedUrl.txt"),
            concurrency: 10,
            request_timeout_secs: fetch.request_timeout.as_secs(),
            aggregation_timeout_secs: 0,
            max_feed_bytes: fetch.max_feed_bytes,
            allow_private_hosts: fetch.allow_private_hosts,
            date_format: crate::feed::DEFAULT_DATE_FORMAT.to_string(),
            indent: 2,
            user_agent: fetch.user_agent,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 9] = [
        "feeds_file",
        "concurrency",
        "request_timeout_secs",
        "aggregation_timeout_secs",
        "max_feed_bytes",
        "allow_private_hosts",
        "date_format",
        "indent",
        "user_agent",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Invalid `date_format` → `Err(ConfigError::DateFormat)`
    /// - Unknown keys → accepted, each logged as a warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to avoid loading a huge file
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {} // Size is within limits, proceed
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse the TOML content first as a raw table to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.date_format()?;
        tracing::info!(
            path = %path.display(),
            feeds_file = %config.feeds_file.display(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn date_format(&self) -> Result<DateFormat, InvalidDateFormat> {
        DateFormat::new(&self.date_format)
    }

    pub fn strategy(&self) -> FetchStrategy {
        FetchStrategy::from_limit(self.concurrency)
    }

    /// `None` when no deadline is configured.
    pub fn aggregation_deadline(&self) -> Option<Duration> {
        (self.aggregation_timeout_secs > 0).then(|| Duration::from_secs(self.aggregation_timeout_secs))
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_feed_bytes: self.max_feed_bytes,
            allow_private_hosts: self.allow_private_hosts,
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn serializer_options(&self) -> SerializerOptions {
        SerializerOptions::with_indent(self.indent)
    }
}

// ============================================================================
// Tests
// ============================================================================
