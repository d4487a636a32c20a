//! # Book Archive
//!
//! A personal book catalog backed by an embedded `SQLite` store.
//!
//! The interesting part of the crate is the storage layer: a single
//! connection shared by concurrent callers, a prepared-statement cache,
//! reader/writer locking around statement stepping, and busy-retry with
//! exponential backoff.
//!
//! ## Layers
//!
//! - [`storage`]: connection manager, statement cache, execution engine
//! - [`catalog`]: the CRUD operations on books
//! - [`cli`]: the interactive shell, command parsing and table rendering
//! - [`observability`]: file logging through `tracing`
//! - [`config`]: layered configuration (file, environment, flags)
//!
//! ## Example
//!
//! ```rust,ignore
//! use book_archive::{ArchiveConfig, Catalog};
//!
//! let catalog = Catalog::open(&ArchiveConfig::default())?;
//! catalog.insert(1, "The Great Gatsby", "F. Scott Fitzgerald");
//! let hits = catalog.find("gatsby");
//! assert_eq!(hits.len(), 1);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod catalog;
pub mod cli;
pub mod config;
pub mod models;
pub mod observability;
pub mod storage;

pub use catalog::Catalog;
pub use config::{ArchiveConfig, RetryConfig};
pub use models::Book;
pub use observability::{LogFormat, LogLevel};
pub use storage::{RetryPolicy, SqliteEngine, Store, StoreEngine};

/// Error type for book archive operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Connection` | The database file cannot be opened |
/// | `Schema` | The `books` table cannot be created |
/// | `Compile` | A SQL template fails to prepare |
/// | `Bind` | A parameter cannot be bound to a statement |
/// | `ContentionExhausted` | The store stays busy through every retry |
/// | `Execution` | A step fails, including constraint violations |
/// | `InvalidInput` | A shell command or config value is malformed |
/// | `OperationFailed` | Config, IO or logging setup fails |
///
/// Only `Connection` and `Schema` abort startup. Everything raised while
/// serving an operation is logged and turned into a `false` or an empty
/// result by the execution engine.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The store could not be opened.
    #[error("cannot open database '{path}': {cause}")]
    Connection {
        /// Path of the database file.
        path: String,
        /// The underlying cause.
        cause: String,
    },

    /// The catalog table could not be created.
    #[error("failed to create schema: {0}")]
    Schema(String),

    /// A SQL template failed to compile.
    #[error("failed to prepare statement: {cause} for SQL: {sql}")]
    Compile {
        /// The SQL text that was being prepared.
        sql: String,
        /// The underlying cause.
        cause: String,
    },

    /// A parameter failed to bind.
    #[error("failed to bind parameter {index}: {cause}")]
    Bind {
        /// 1-based parameter index.
        index: usize,
        /// The underlying cause.
        cause: String,
    },

    /// The store stayed busy through the whole retry budget.
    #[error("database still busy after {retries} retries: {cause}")]
    ContentionExhausted {
        /// Number of retries performed.
        retries: u32,
        /// The last busy diagnostic from the engine.
        cause: String,
    },

    /// Statement execution failed.
    #[error("failed to execute SQL: {0}")]
    Execution(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation outside the store failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for book archive operations.
pub type Result<T> = std::result::Result<T, Error>;
