//! Connection setup and lock helpers for the `SQLite` store.
//!
//! This module provides poison-recovering lock acquisition, the startup
//! pragmas, and schema creation.

use crate::catalog::CATALOG_TEMPLATES;
use crate::config::ArchiveConfig;
use crate::{Error, Result};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// Catalog table.
pub const CREATE_BOOKS_TABLE: &str = "CREATE TABLE IF NOT EXISTS books (\
     id INTEGER PRIMARY KEY, \
     title TEXT NOT NULL, \
     author TEXT NOT NULL, \
     created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP);";

/// Search index over (title, author).
pub const CREATE_TITLE_AUTHOR_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_books_title_author ON books(title, author);";

/// Helper to acquire mutex lock with poison recovery.
///
/// If the mutex is poisoned (due to a panic in a previous critical section),
/// we recover the inner value and log a warning. This prevents cascading
/// failures when one operation panics.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Shared acquisition of a reader/writer lock, recovering from poison.
pub fn acquire_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite rwlock was poisoned, recovering shared access");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Exclusive acquisition of a reader/writer lock, recovering from poison.
pub fn acquire_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite rwlock was poisoned, recovering exclusive access");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Applies the startup pragmas.
///
/// # Configuration Applied
///
/// - **`foreign_keys = ON`**
/// - **WAL mode**: concurrent readers alongside a single writer
/// - **NORMAL synchronous**: balances durability with performance
/// - **`cache_size`**: page cache budget from the config
/// - **`temp_store = MEMORY`**
/// - **`busy_timeout`**: from the config; zero leaves contention to the
///   retry policy
///
/// Every directive is best-effort. A failure is logged at ERROR and the
/// remaining directives still run.
pub fn configure_connection(conn: &Connection, config: &ArchiveConfig) {
    let directives: [(&str, Result<()>); 5] = [
        (
            "foreign_keys",
            conn.pragma_update(None, "foreign_keys", "ON")
                .map_err(pragma_error),
        ),
        (
            "journal_mode",
            // journal_mode answers with the resulting mode as a row
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })
            .map(|mode| tracing::debug!(mode = %mode, "Journal mode set"))
            .map_err(pragma_error),
        ),
        (
            "synchronous",
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(pragma_error),
        ),
        (
            "cache_size",
            conn.pragma_update(None, "cache_size", config.page_cache_size)
                .map_err(pragma_error),
        ),
        (
            "temp_store",
            conn.pragma_update(None, "temp_store", "MEMORY")
                .map_err(pragma_error),
        ),
    ];

    for (pragma, result) in directives {
        if let Err(e) = result {
            tracing::error!(pragma, "Failed to set pragma: {e}");
        }
    }

    if let Err(e) = conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms)) {
        tracing::error!("Failed to set busy timeout: {e}");
    }

    conn.set_prepared_statement_cache_capacity(
        config.statement_cache_capacity.max(CATALOG_TEMPLATES),
    );
}

/// Creates the catalog table and its index if absent.
///
/// # Errors
///
/// Returns [`Error::Schema`] if the table cannot be created. A failed index
/// creation is logged and ignored.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_BOOKS_TABLE).map_err(|e| {
        tracing::error!("Failed to create table: {e}");
        Error::Schema(e.to_string())
    })?;

    if let Err(e) = conn.execute_batch(CREATE_TITLE_AUTHOR_INDEX) {
        tracing::error!("Failed to create index: {e}");
    }

    Ok(())
}

fn pragma_error(e: rusqlite::Error) -> Error {
    Error::OperationFailed {
        operation: "pragma".to_string(),
        cause: e.to_string(),
    }
}
