//! Configuration management.
//!
//! Values are layered, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. TOML config file
//! 3. Environment variables (`BOOK_ARCHIVE_*`)
//! 4. Command-line flags (applied by the binary)

use crate::catalog::CATALOG_TEMPLATES;
use crate::observability::{LogFormat, LogLevel};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default database file, relative to the working directory.
pub const DEFAULT_DB_FILE: &str = "book_archive.db";

/// Default log file, relative to the working directory.
pub const DEFAULT_LOG_FILE: &str = "book_archive.log";

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "BOOK_ARCHIVE_CONFIG_PATH";

/// Main configuration for the book archive.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Path to the `SQLite` database file.
    pub db_path: PathBuf,
    /// Log file; `None` disables file logging.
    pub log_file: Option<PathBuf>,
    /// Minimum level written to the log.
    pub log_level: LogLevel,
    /// Log line format.
    pub log_format: LogFormat,
    /// Busy-retry budget for statement execution.
    pub retry: RetryConfig,
    /// `SQLite` busy handler timeout in milliseconds. Zero hands contention
    /// straight to the retry policy.
    pub busy_timeout_ms: u64,
    /// Value for `PRAGMA cache_size`.
    pub page_cache_size: i64,
    /// Capacity of the connection-level compiled statement cache.
    pub statement_cache_capacity: usize,
}

/// Busy-retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first busy result (default: 5).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay in milliseconds for exponential backoff (default: 10).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

const fn default_max_retries() -> u32 {
    5
}

const fn default_base_delay_ms() -> u64 {
    10
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Calculates the delay for a given attempt using exponential backoff.
    ///
    /// Formula: `base_delay_ms` * 2^(attempt - 1)
    ///
    /// # Arguments
    ///
    /// * `attempt` - The retry number (1-based)
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        if attempt == 0 {
            return 0;
        }
        self.base_delay_ms
            .saturating_mul(1 << (attempt - 1).min(10))
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Database path.
    pub db_path: Option<String>,
    /// Log file path; an empty string disables file logging.
    pub log_file: Option<String>,
    /// Log level name.
    pub log_level: Option<String>,
    /// Log format name.
    pub log_format: Option<String>,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: Option<u64>,
    /// Page cache size.
    pub page_cache_size: Option<i64>,
    /// Statement cache capacity.
    pub statement_cache_capacity: Option<usize>,
    /// Retry section.
    pub retry: Option<RetryConfig>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE),
            log_file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
            log_level: LogLevel::build_default(),
            log_format: LogFormat::default(),
            retry: RetryConfig::default(),
            busy_timeout_ms: 0,
            page_cache_size: 1000,
            statement_cache_capacity: 16,
        }
    }
}

impl ArchiveConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration for the given database file.
    #[must_use]
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Sets the log file.
    #[must_use]
    pub fn with_log_file(mut self, path: Option<PathBuf>) -> Self {
        self.log_file = path;
        self
    }

    /// Sets the log level.
    #[must_use]
    pub const fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Sets the retry budget.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;

        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for [`ConfigFile`].
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks `BOOK_ARCHIVE_CONFIG_PATH` first, then the platform config dir
    /// (`~/.config/book-archive/config.toml` on Linux). Returns defaults if no
    /// readable config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
            if !config_path.trim().is_empty() {
                if let Ok(config) = Self::load_from_file(Path::new(&config_path)) {
                    return config;
                }
            }
        }

        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let platform_config = base_dirs
            .config_dir()
            .join("book-archive")
            .join("config.toml");
        if platform_config.exists() {
            if let Ok(config) = Self::load_from_file(&platform_config) {
                return config;
            }
        }

        Self::default()
    }

    /// Applies `BOOK_ARCHIVE_*` environment overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("BOOK_ARCHIVE_DB") {
            if !v.trim().is_empty() {
                self.db_path = PathBuf::from(v);
            }
        }
        if let Ok(v) = std::env::var("BOOK_ARCHIVE_LOG_FILE") {
            self.log_file = parse_log_file(&v);
        }
        if let Ok(v) = std::env::var("BOOK_ARCHIVE_LOG_LEVEL") {
            if let Some(level) = LogLevel::parse(&v) {
                self.log_level = level;
            }
        }
        self
    }

    /// Converts a `ConfigFile` to `ArchiveConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(db_path) = file.db_path {
            config.db_path = PathBuf::from(db_path);
        }
        if let Some(log_file) = file.log_file {
            config.log_file = parse_log_file(&log_file);
        }
        if let Some(level) = file.log_level.as_deref().and_then(LogLevel::parse) {
            config.log_level = level;
        }
        if let Some(format) = file.log_format.as_deref() {
            config.log_format = LogFormat::parse(format);
        }
        if let Some(busy_timeout_ms) = file.busy_timeout_ms {
            config.busy_timeout_ms = busy_timeout_ms;
        }
        if let Some(page_cache_size) = file.page_cache_size {
            config.page_cache_size = page_cache_size;
        }
        if let Some(capacity) = file.statement_cache_capacity {
            config.statement_cache_capacity = capacity.max(CATALOG_TEMPLATES);
        }
        if let Some(retry) = file.retry {
            config.retry = retry;
        }

        config
    }
}

/// Empty means "no log file".
fn parse_log_file(value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}
