//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub view: ViewConfig,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Message store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("framelog").join("messages.db"))
        .unwrap_or_else(|| PathBuf::from("./framelog_data/messages.db"))
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Paged view configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ViewConfig {
    /// Rows fetched per page load
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Pages kept in the window before the least recently used is dropped
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Payload characters (text) or bytes (binary) loaded per row
    #[serde(default = "default_preview_length")]
    pub payload_preview_length: usize,

    /// Fully hydrated messages kept in memory
    #[serde(default = "default_full_cache_capacity")]
    pub full_cache_capacity: usize,

    /// Capacity of the view event broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_page_size() -> usize {
    50
}

fn default_max_pages() -> usize {
    8
}

fn default_preview_length() -> usize {
    150
}

fn default_full_cache_capacity() -> usize {
    10
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            payload_preview_length: default_preview_length(),
            full_cache_capacity: default_full_cache_capacity(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Change feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Maximum number of registered listeners
    #[serde(default = "default_max_listeners")]
    pub max_listeners: usize,
}

fn default_max_listeners() -> usize {
    64
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max_listeners: default_max_listeners(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Standard config file locations, in search order
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("framelog").join("config.toml")),
            Some(PathBuf::from("/etc/framelog/config.toml")),
            Some(PathBuf::from("./framelog.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// First existing file among the standard locations
    pub fn locate() -> Option<PathBuf> {
        first_existing(&Self::default_paths())
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        if let Some(path) = Self::locate() {
            match Self::load_with_env(&path) {
                Ok(config) => {
                    tracing::info!("Loaded config from {:?}", path);
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load config from {:?}: {}", path, e);
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("FRAMELOG_DB_PATH") {
            self.store.path = PathBuf::from(path);
        }

        if let Ok(size) = std::env::var("FRAMELOG_PAGE_SIZE") {
            if let Ok(n) = size.parse() {
                self.view.page_size = n;
            }
        }

        if let Ok(level) = std::env::var("FRAMELOG_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("FRAMELOG_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

fn first_existing(paths: &[PathBuf]) -> Option<PathBuf> {
    paths.iter().find(|p| p.exists()).cloned()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# framelog configuration
#
# Environment variables override these settings:
# - FRAMELOG_DB_PATH
# - FRAMELOG_PAGE_SIZE
# - FRAMELOG_LOG_LEVEL
# - FRAMELOG_LOG_FORMAT

[store]
# SQLite database holding captured messages
path = "~/.local/share/framelog/messages.db"

[view]
# Rows fetched per page load
page_size = 50

# Pages kept in memory per view
max_pages = 8

# Payload characters shown per row before "..."
payload_preview_length = 150

# Fully loaded messages kept per view
full_cache_capacity = 10

# Buffered view events per subscriber
event_capacity = 1024

[feed]
# Maximum number of views listening for new messages
max_listeners = 64

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/framelog/framelog.log"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.view.page_size, 50);
        assert_eq!(config.view.payload_preview_length, 150);
        assert_eq!(config.view.full_cache_capacity, 10);
        assert_eq!(config.feed.max_listeners, 64);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.view.page_size, 50);
        assert_eq!(config.view.max_pages, 8);
        assert_eq!(config.logging.format, "pretty");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::parse(
            r#"
            [view]
            page_size = 20
            "#,
        )
        .unwrap();
        assert_eq!(config.view.page_size, 20);
        assert_eq!(config.view.full_cache_capacity, 10);
        assert_eq!(config.feed.max_listeners, 64);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/framelog.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[view\npage_size = ").unwrap();

        match Config::load(&path) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_first_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let present = dir.path().join("framelog.toml");
        let later = dir.path().join("later.toml");
        std::fs::write(&present, "").unwrap();
        std::fs::write(&later, "").unwrap();

        assert_eq!(
            first_existing(&[missing.clone(), present.clone(), later]),
            Some(present)
        );
        assert_eq!(first_existing(&[missing]), None);
    }
}
