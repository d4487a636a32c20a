//! Observability: file logging through `tracing`.
//!
//! The archive writes to an append-only log file. Messages below the
//! configured level are dropped, the level can be changed at runtime, and
//! once the sink is closed (or if it never opened) messages are silently
//! discarded.

mod logging;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry, reload};

type FilteredRegistry = Layered<reload::Layer<LevelFilter, Registry>, Registry>;
type BoxedFmtLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

/// Handle for runtime level changes.
#[derive(Clone)]
pub struct LogLevelHandle {
    inner: reload::Handle<LevelFilter, Registry>,
}

impl LogLevelHandle {
    /// Switches the active log level.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscriber owning the filter is gone.
    pub fn set(&self, level: LogLevel) -> Result<()> {
        self.inner
            .reload(level.filter())
            .map_err(|e| Error::OperationFailed {
                operation: "set_log_level".to_string(),
                cause: e.to_string(),
            })?;
        tracing::info!(level = %level, "Log level set to: {level}");
        Ok(())
    }

    /// Returns the active log level.
    #[must_use]
    pub fn current(&self) -> Option<LogLevel> {
        self.inner.clone_current().map(LogLevel::from_filter)
    }
}

impl std::fmt::Debug for LogLevelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogLevelHandle")
            .field("current", &self.current())
            .finish()
    }
}

/// Handle for the installed log sink.
///
/// Dropping the handle flushes and closes the log file.
#[derive(Debug, Default)]
pub struct ObservabilityHandle {
    writer: Option<LogFileWriter>,
    level: Option<LogLevelHandle>,
}

impl ObservabilityHandle {
    /// A handle with no sink installed.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            writer: None,
            level: None,
        }
    }

    /// Returns a handle for runtime level changes, if logging is active.
    #[must_use]
    pub fn level_handle(&self) -> Option<LogLevelHandle> {
        self.level.clone()
    }

    /// Flushes and closes the log file. Later events are dropped.
    pub fn shutdown(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.close();
        }
    }
}

impl Drop for ObservabilityHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Initializes file logging for the process.
///
/// With no log file configured this installs nothing and returns a
/// disabled handle.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or a global subscriber
/// is already installed.
pub fn init(config: &LoggingConfig) -> Result<ObservabilityHandle> {
    let Some(path) = config.file.as_deref() else {
        return Ok(ObservabilityHandle::disabled());
    };

    let writer = open_log_file(path)?;
    let (subscriber, level) = build_subscriber(config, writer.clone());
    subscriber.try_init().map_err(init_error)?;

    Ok(ObservabilityHandle {
        writer: Some(writer),
        level: Some(level),
    })
}

/// Builds a subscriber writing to `writer` without installing it.
pub fn build_subscriber(
    config: &LoggingConfig,
    writer: LogFileWriter,
) -> (impl tracing::Subscriber + Send + Sync + 'static, LogLevelHandle) {
    let (filter, handle) = reload::Layer::new(config.level.filter());

    let fmt_layer: BoxedFmtLayer = match config.format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    (subscriber, LogLevelHandle { inner: handle })
}

/// Thread-safe, closable file writer for logging.
#[derive(Clone, Debug)]
pub struct LogFileWriter {
    file: Arc<Mutex<Option<File>>>,
}

impl LogFileWriter {
    /// Wraps an already opened file.
    #[must_use]
    pub fn new(file: File) -> Self {
        Self {
            file: Arc::new(Mutex::new(Some(file))),
        }
    }

    /// Flushes and releases the file.
    pub fn close(&self) {
        let mut guard = lock_sink(&self.file);
        if let Some(mut file) = guard.take() {
            let _ = file.flush();
        }
    }

    /// Returns true once the file has been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        lock_sink(&self.file).is_none()
    }
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match lock_sink(&self.file).as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match lock_sink(&self.file).as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogFileWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// A panic while writing a log line must not take logging down with it.
fn lock_sink(mutex: &Mutex<Option<File>>) -> MutexGuard<'_, Option<File>> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Opens a log file for appending.
///
/// # Errors
///
/// Returns an error if the parent directory or the file cannot be created.
pub fn open_log_file(path: &Path) -> Result<LogFileWriter> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
            operation: "create_log_dir".to_string(),
            cause: e.to_string(),
        })?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::OperationFailed {
            operation: "open_log_file".to_string(),
            cause: format!("{}: {}", path.display(), e),
        })?;

    Ok(LogFileWriter::new(file))
}

/// Helper to convert init errors.
#[allow(clippy::needless_pass_by_value)]
fn init_error(e: tracing_subscriber::util::TryInitError) -> Error {
    Error::OperationFailed {
        operation: "observability_init".to_string(),
        cause: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn logging_config(level: LogLevel) -> LoggingConfig {
        LoggingConfig {
            file: None,
            level,
            format: LogFormat::Text,
        }
    }

    #[test]
    fn test_level_filtering_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("archive.log");
        let writer = open_log_file(&path).unwrap();
        let (subscriber, level) = build_subscriber(&logging_config(LogLevel::Error), writer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("hidden debug line");
            tracing::info!("hidden info line");
            tracing::error!("visible error line");

            level.set(LogLevel::Debug).unwrap();
            assert_eq!(level.current(), Some(LogLevel::Debug));
            tracing::debug!("visible debug line");
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("visible error line"));
        assert!(contents.contains("visible debug line"));
        assert!(!contents.contains("hidden debug line"));
        assert!(!contents.contains("hidden info line"));
        assert!(contents.contains("ERROR"));
    }

    #[test]
    fn test_closed_writer_drops_silently() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("archive.log");
        let mut writer = open_log_file(&path).unwrap();

        writer.write_all(b"before close\n").unwrap();
        writer.close();
        assert!(writer.is_closed());
        writer.write_all(b"after close\n").unwrap();
        writer.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("before close"));
        assert!(!contents.contains("after close"));
    }

    #[test]
    fn test_open_log_file_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("logs").join("archive.log");
        let writer = open_log_file(&path);
        assert!(writer.is_ok());
        assert!(path.exists());
    }

    #[test]
    fn test_init_without_file_is_disabled() {
        let handle = init(&logging_config(LogLevel::Info)).unwrap();
        assert!(handle.level_handle().is_none());
    }

    #[test]
    fn test_json_format_writes_objects() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("archive.json.log");
        let writer = open_log_file(&path).unwrap();
        let config = LoggingConfig {
            file: None,
            level: LogLevel::Info,
            format: LogFormat::Json,
        };
        let (subscriber, _level) = build_subscriber(&config, writer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(id = 3, "Adding book");
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        let line = contents.lines().next().unwrap();
        assert!(line.starts_with('{'));
        assert!(line.contains("Adding book"));
    }
}
