//! Configuration management for KEV sync

use kevsync_core::{EntryPolicy, Error, Result, DEFAULT_KEV_URL};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Feed retrieval and reconciliation settings
    #[serde(default)]
    pub kevsync: KevSyncConfig,

    /// Local store settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Create a configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Merge with environment variables (KEVSYNC_ prefix).
    ///
    /// Fails if `KEVSYNC_ON_MISSING_IDENTIFIER` is set to something other
    /// than `skip` or `abort`.
    pub fn merge_env(self) -> Result<Self> {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name
    pub fn merge_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(val) = lookup("KEVSYNC_JSON_URL") {
            self.kevsync.json_url = val;
        }
        if let Some(val) = lookup("KEVSYNC_SCHEMA_URL") {
            self.kevsync.schema_url = if val.is_empty() { None } else { Some(val) };
        }
        if let Some(val) = lookup("KEVSYNC_ON_MISSING_IDENTIFIER") {
            self.kevsync.on_missing_identifier =
                val.parse::<EntryPolicy>().map_err(|message| Error::InvalidConfig {
                    key: String::from("KEVSYNC_ON_MISSING_IDENTIFIER"),
                    message,
                })?;
        }
        if let Some(val) = lookup("KEVSYNC_DATABASE_PATH") {
            self.database.path = val;
        }

        // Logging
        if let Some(val) = lookup("KEVSYNC_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = lookup("KEVSYNC_LOG_FORMAT") {
            self.logging.format = val;
        }

        Ok(self)
    }

    /// Check values that serde cannot check on its own
    pub fn validate(&self) -> Result<()> {
        check_http_url("kevsync.json_url", &self.kevsync.json_url)?;
        if let Some(ref schema_url) = self.kevsync.schema_url {
            check_http_url("kevsync.schema_url", schema_url)?;
        }

        if self.kevsync.request_timeout_seconds == 0 {
            return Err(Error::InvalidConfig {
                key: String::from("kevsync.request_timeout_seconds"),
                message: String::from("must be greater than zero"),
            });
        }
        if self.kevsync.max_attempts == 0 {
            return Err(Error::InvalidConfig {
                key: String::from("kevsync.max_attempts"),
                message: String::from("must be at least 1"),
            });
        }
        if self.database.path.trim().is_empty() {
            return Err(Error::InvalidConfig {
                key: String::from("database.path"),
                message: String::from("must not be empty"),
            });
        }

        Ok(())
    }
}

fn check_http_url(key: &str, value: &str) -> Result<()> {
    let lower = value.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(())
    } else {
        Err(Error::InvalidConfig {
            key: key.to_string(),
            message: format!("'{}' must start with http:// or https://", value),
        })
    }
}

/// Feed and reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KevSyncConfig {
    /// URL of the KEV JSON feed
    #[serde(default = "default_json_url")]
    pub json_url: String,

    /// URL of the JSON Schema for the feed; validation is skipped when unset
    #[serde(default)]
    pub schema_url: Option<String>,

    /// Timeout for each feed/schema request in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u32,

    /// Attempts per retrieval, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay between retrieval attempts in milliseconds
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Handling of feed entries without a cveID
    #[serde(default)]
    pub on_missing_identifier: EntryPolicy,
}

fn default_json_url() -> String {
    String::from(DEFAULT_KEV_URL)
}

fn default_request_timeout() -> u32 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    1000
}

impl Default for KevSyncConfig {
    fn default() -> Self {
        Self {
            json_url: default_json_url(),
            schema_url: None,
            request_timeout_seconds: 30,
            max_attempts: 3,
            retry_backoff_ms: 1000,
            on_missing_identifier: EntryPolicy::Skip,
        }
    }
}

impl KevSyncConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.request_timeout_seconds))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Local store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database holding the KEV collection
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    String::from("/var/lib/kevsync/kev.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_log_format() -> String {
    String::from("pretty")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("pretty"),
        }
    }
}

/// Builder for constructing Config
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn json_url(mut self, url: impl Into<String>) -> Self {
        self.config.kevsync.json_url = url.into();
        self
    }

    pub fn schema_url(mut self, url: impl Into<String>) -> Self {
        self.config.kevsync.schema_url = Some(url.into());
        self
    }

    pub fn request_timeout_seconds(mut self, seconds: u32) -> Self {
        self.config.kevsync.request_timeout_seconds = seconds;
        self
    }

    pub fn on_missing_identifier(mut self, policy: EntryPolicy) -> Self {
        self.config.kevsync.on_missing_identifier = policy;
        self
    }

    pub fn database_path(mut self, path: impl Into<String>) -> Self {
        self.config.database.path = path.into();
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
