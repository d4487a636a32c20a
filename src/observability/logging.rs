//! Log levels, formats and logging configuration.

use crate::config::ArchiveConfig;
use std::fmt;
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Severity levels understood by the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    /// Everything, including statement execution and busy retries.
    Debug,
    /// Operation attempts and lifecycle events.
    Info,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// Parses a level name, ignoring case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Some(Self::Debug),
            "INFO" => Some(Self::Info),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }

    /// Default level for this build: DEBUG in debug builds, ERROR in release.
    #[must_use]
    pub const fn build_default() -> Self {
        if cfg!(debug_assertions) {
            Self::Debug
        } else {
            Self::Error
        }
    }

    /// Returns the level name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Error => "ERROR",
        }
    }

    /// Returns the `tracing` filter that admits this level and above.
    #[must_use]
    pub const fn filter(self) -> LevelFilter {
        match self {
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Error => LevelFilter::ERROR,
        }
    }

    /// Maps a `tracing` filter back to the nearest archive level.
    #[must_use]
    pub fn from_filter(filter: LevelFilter) -> Self {
        if filter >= LevelFilter::DEBUG {
            Self::Debug
        } else if filter >= LevelFilter::INFO {
            Self::Info
        } else {
            Self::Error
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// `[timestamp] LEVEL target: message` lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format name; anything unrecognised is `Text`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log file; `None` disables logging.
    pub file: Option<PathBuf>,
    /// Initial level.
    pub level: LogLevel,
    /// Line format.
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Builds the logging configuration from the archive configuration.
    #[must_use]
    pub fn from_config(config: &ArchiveConfig) -> Self {
        Self {
            file: config.log_file.clone(),
            level: config.log_level,
            format: config.log_format,
        }
    }
}
