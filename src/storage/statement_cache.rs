//! Prepared statement cache.
//!
//! Maps exact SQL text to a compiled statement. Lookups take the map's
//! shared lock; a miss upgrades to the exclusive lock and checks again
//! before compiling, so concurrent first uses of one template compile it
//! once. Entries are never evicted; [`StatementCache::clear`] hands every
//! statement back to the engine at shutdown.

use super::engine::EngineResult;
use super::sqlite::{acquire_read, acquire_write};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// A cached statement. The mutex gives one caller at a time the whole
/// reset, bind and step sequence.
pub type SharedStatement<S> = Arc<Mutex<S>>;

/// Read-through cache of compiled statements keyed by SQL text.
pub struct StatementCache<S> {
    entries: RwLock<HashMap<String, SharedStatement<S>>>,
    compilations: AtomicU64,
}

impl<S> Default for StatementCache<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for StatementCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementCache")
            .field("len", &self.len())
            .field("compilations", &self.compilations())
            .finish()
    }
}

impl<S> StatementCache<S> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            compilations: AtomicU64::new(0),
        }
    }

    /// Returns the cached statement for `sql`, compiling it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Compile`] if `compile` fails. Nothing is cached in
    /// that case, so a later call tries again.
    pub fn get_or_compile<F>(&self, sql: &str, compile: F) -> Result<SharedStatement<S>>
    where
        F: FnOnce(&str) -> EngineResult<S>,
    {
        if let Some(statement) = acquire_read(&self.entries).get(sql) {
            return Ok(Arc::clone(statement));
        }

        let mut entries = acquire_write(&self.entries);
        if let Some(statement) = entries.get(sql) {
            return Ok(Arc::clone(statement));
        }

        tracing::debug!("Preparing statement: {sql}");
        let compiled = compile(sql).map_err(|e| {
            tracing::error!("Failed to prepare statement: {e} for SQL: {sql}");
            Error::Compile {
                sql: sql.to_string(),
                cause: e.to_string(),
            }
        })?;
        self.compilations.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("statement_cache_compilations_total").increment(1);

        let statement = Arc::new(Mutex::new(compiled));
        entries.insert(sql.to_string(), Arc::clone(&statement));
        Ok(statement)
    }

    /// Returns true if `sql` has been compiled.
    #[must_use]
    pub fn contains(&self, sql: &str) -> bool {
        acquire_read(&self.entries).contains_key(sql)
    }

    /// Number of cached statements.
    #[must_use]
    pub fn len(&self) -> usize {
        acquire_read(&self.entries).len()
    }

    /// Returns true if nothing has been compiled yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        acquire_read(&self.entries).is_empty()
    }

    /// Number of compilations performed over the cache's lifetime.
    #[must_use]
    pub fn compilations(&self) -> u64 {
        self.compilations.load(Ordering::Relaxed)
    }

    /// Removes every entry and passes each statement to `finalize`.
    ///
    /// A statement still referenced elsewhere cannot be taken back; it is
    /// skipped and released when its last reference drops. Returns the
    /// number of statements finalized.
    pub fn clear<F>(&self, mut finalize: F) -> usize
    where
        F: FnMut(S),
    {
        let drained: Vec<_> = acquire_write(&self.entries).drain().collect();
        let mut finalized = 0;
        for (sql, statement) in drained {
            match Arc::try_unwrap(statement) {
                Ok(mutex) => {
                    let statement = mutex
                        .into_inner()
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    finalize(statement);
                    finalized += 1;
                },
                Err(_) => tracing::warn!("Statement still in use at shutdown: {sql}"),
            }
        }
        finalized
    }
}
