//! Connection manager.
//!
//! A [`Store`] owns the one engine connection, the statement cache and the
//! reader/writer lock that decides who may step. Dropping it finalizes every
//! cached statement and then closes the connection; [`Store::close`] does
//! the same and reports the outcome. Teardown runs once.

use super::engine::StoreEngine;
use super::retry::RetryPolicy;
use super::sqlite::SqliteEngine;
use super::statement_cache::StatementCache;
use crate::config::ArchiveConfig;
use crate::{Error, Result};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// A store shared by every caller in the process.
pub struct Store<E: StoreEngine> {
    pub(super) engine: E,
    /// Held exclusively across a write's whole retry loop and shared for
    /// each read step.
    pub(super) access: RwLock<()>,
    pub(super) statements: StatementCache<E::Statement>,
    pub(super) retry: RetryPolicy,
    closed: AtomicBool,
}

impl<E: StoreEngine> std::fmt::Debug for Store<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("statements", &self.statements)
            .field("retry", &self.retry)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Store<SqliteEngine> {
    /// Opens the `SQLite` database named by the config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] or [`Error::Schema`] if the database
    /// cannot be opened or initialized.
    pub fn open(config: &ArchiveConfig) -> Result<Self> {
        let engine = SqliteEngine::open(config)?;
        tracing::info!(
            "Database initialized successfully: {}",
            config.db_path.display()
        );
        Ok(Self::with_engine(engine, RetryPolicy::new(config.retry)))
    }
}

impl<E: StoreEngine> Store<E> {
    /// Wraps an already opened engine.
    #[must_use]
    pub fn with_engine(engine: E, retry: RetryPolicy) -> Self {
        Self {
            engine,
            access: RwLock::new(()),
            statements: StatementCache::new(),
            retry,
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the engine.
    #[must_use]
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// Returns the statement cache.
    #[must_use]
    pub const fn statements(&self) -> &StatementCache<E::Statement> {
        &self.statements
    }

    /// Returns the retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Finalizes every cached statement and closes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the engine fails to close.
    pub fn close(self) -> Result<()> {
        self.teardown()
    }

    fn teardown(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let finalized = self.statements.clear(|statement| self.engine.finalize(statement));
        tracing::debug!("Finalized {finalized} prepared statements");

        self.engine.close().map_err(|e| Error::OperationFailed {
            operation: "close_database".to_string(),
            cause: e.to_string(),
        })?;
        tracing::info!("Database connection closed");
        Ok(())
    }
}

impl<E: StoreEngine> Drop for Store<E> {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            tracing::error!("Failed to close database: {e}");
        }
    }
}
