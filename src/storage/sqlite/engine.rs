//! `SQLite` implementation of [`StoreEngine`].
//!
//! `rusqlite` statements borrow their connection, so they cannot be stored
//! next to it. The compiled form lives in the connection's own prepared
//! statement cache (sized from the config so it never evicts the catalog
//! templates); a [`SqliteStatement`] is the owned handle to it and carries
//! its own copies of the bound values.
//!
//! Writes step once, to completion. A query runs its scan on the first step
//! and hands out the buffered rows on the following steps.

use super::connection::{acquire_lock, configure_connection, ensure_schema};
use crate::config::ArchiveConfig;
use crate::storage::engine::{EngineError, EngineResult, Step, StoreEngine};
use crate::storage::row::{Row, Value};
use crate::{Error, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
            {
                Self::Busy(err.to_string())
            },
            _ => Self::Failure(err.to_string()),
        }
    }
}

/// The single connection to the on-disk catalog.
pub struct SqliteEngine {
    /// `None` once closed.
    conn: Mutex<Option<Connection>>,
    /// Path to the database file (None for in-memory).
    db_path: Option<PathBuf>,
    /// Handles compiled and not yet finalized.
    live_statements: AtomicUsize,
}

impl std::fmt::Debug for SqliteEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteEngine")
            .field("db_path", &self.db_path)
            .field("live_statements", &self.live_statements())
            .finish_non_exhaustive()
    }
}

/// Owned handle to a compiled statement.
#[derive(Debug)]
pub struct SqliteStatement {
    sql: String,
    parameter_count: usize,
    column_count: usize,
    bindings: Vec<Option<String>>,
    scan: Option<Scan>,
}

/// Rows buffered by a query's first step.
#[derive(Debug, Default)]
struct Scan {
    rows: VecDeque<Row>,
    /// Error that ended the scan early, reported after the buffered rows.
    trailing_error: Option<EngineError>,
}

impl Scan {
    fn next_step(&mut self) -> EngineResult<Step> {
        if let Some(row) = self.rows.pop_front() {
            return Ok(Step::Row(row));
        }
        match self.trailing_error.take() {
            Some(e) => Err(e),
            None => Ok(Step::Done),
        }
    }
}

impl SqliteStatement {
    fn new(sql: &str, parameter_count: usize, column_count: usize) -> Self {
        Self {
            sql: sql.to_string(),
            parameter_count,
            column_count,
            bindings: vec![None; parameter_count],
            scan: None,
        }
    }

    /// The SQL text this handle was compiled from.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of `?` parameters.
    #[must_use]
    pub const fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    /// Returns true if the statement produces rows.
    #[must_use]
    pub const fn is_query(&self) -> bool {
        self.column_count > 0
    }
}

impl SqliteEngine {
    /// Opens the database file, applies the pragmas and creates the schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the file cannot be opened and
    /// [`Error::Schema`] if the catalog table cannot be created.
    pub fn open(config: &ArchiveConfig) -> Result<Self> {
        let path = config.db_path.clone();
        let conn = Connection::open(&path).map_err(|e| {
            tracing::error!("Cannot open database: {e}");
            Error::Connection {
                path: path.display().to_string(),
                cause: e.to_string(),
            }
        })?;

        Self::initialize(conn, Some(path), config)
    }

    /// Opens a private in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory(config: &ArchiveConfig) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Connection {
            path: ":memory:".to_string(),
            cause: e.to_string(),
        })?;

        Self::initialize(conn, None, config)
    }

    fn initialize(conn: Connection, db_path: Option<PathBuf>, config: &ArchiveConfig) -> Result<Self> {
        configure_connection(&conn, config);
        ensure_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            db_path,
            live_statements: AtomicUsize::new(0),
        })
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Version of the linked `SQLite` library.
    #[must_use]
    pub fn library_version() -> &'static str {
        rusqlite::version()
    }

    /// Number of compiled handles not yet finalized.
    #[must_use]
    pub fn live_statements(&self) -> usize {
        self.live_statements.load(Ordering::SeqCst)
    }

    fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let guard = acquire_lock(&self.conn);
        let conn = guard
            .as_ref()
            .ok_or_else(|| EngineError::Failure("database connection is closed".to_string()))?;
        f(conn)
    }

    fn execute(conn: &Connection, statement: &SqliteStatement) -> EngineResult<Step> {
        let mut stmt = conn.prepare_cached(&statement.sql)?;
        bind_all(&mut stmt, &statement.bindings)?;
        stmt.raw_execute()?;
        Ok(Step::Done)
    }

    /// Runs a query to the end. Fails outright if nothing was read; an error
    /// after some rows is kept for after those rows, and is never retried
    /// since the scan cannot resume where it stopped.
    fn scan(conn: &Connection, statement: &SqliteStatement) -> EngineResult<Scan> {
        let mut stmt = conn.prepare_cached(&statement.sql)?;
        bind_all(&mut stmt, &statement.bindings)?;
        let columns = stmt.column_count();

        let mut scan = Scan::default();
        let mut rows = stmt.raw_query();
        loop {
            match rows.next() {
                Ok(Some(row)) => {
                    let values = (0..columns)
                        .map(|i| row.get_ref(i).map(to_value))
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    scan.rows.push_back(Row::new(values));
                },
                Ok(None) => return Ok(scan),
                Err(e) if scan.rows.is_empty() => return Err(e.into()),
                Err(e) => {
                    scan.trailing_error = Some(EngineError::Failure(e.to_string()));
                    return Ok(scan);
                },
            }
        }
    }
}

impl StoreEngine for SqliteEngine {
    type Statement = SqliteStatement;

    fn compile(&self, sql: &str) -> EngineResult<SqliteStatement> {
        self.with_connection(|conn| {
            let stmt = conn.prepare_cached(sql)?;
            let compiled = SqliteStatement::new(sql, stmt.parameter_count(), stmt.column_count());
            self.live_statements.fetch_add(1, Ordering::SeqCst);
            Ok(compiled)
        })
    }

    fn reset(&self, statement: &mut SqliteStatement) {
        statement.bindings.iter_mut().for_each(|value| *value = None);
        statement.scan = None;
    }

    fn bind_text(
        &self,
        statement: &mut SqliteStatement,
        index: usize,
        value: &str,
    ) -> EngineResult<()> {
        let slot = index
            .checked_sub(1)
            .and_then(|i| statement.bindings.get_mut(i))
            .ok_or_else(|| EngineError::Failure("column index out of range".to_string()))?;
        *slot = Some(value.to_owned());
        Ok(())
    }

    fn step(&self, statement: &mut SqliteStatement) -> EngineResult<Step> {
        if let Some(scan) = statement.scan.as_mut() {
            return scan.next_step();
        }

        if !statement.is_query() {
            return self.with_connection(|conn| Self::execute(conn, statement));
        }

        let scan = self.with_connection(|conn| Self::scan(conn, statement))?;
        statement.scan.insert(scan).next_step()
    }

    fn finalize(&self, statement: SqliteStatement) {
        tracing::debug!(sql = %statement.sql, "Finalizing statement");
        drop(statement);
        if self.live_statements.fetch_sub(1, Ordering::SeqCst) == 1 {
            let flushed = self.with_connection(|conn| {
                conn.flush_prepared_statement_cache();
                Ok(())
            });
            if let Err(e) = flushed {
                tracing::debug!("Skipping statement cache flush: {e}");
            }
        }
    }

    fn close(&self) -> EngineResult<()> {
        let Some(conn) = acquire_lock(&self.conn).take() else {
            return Ok(());
        };
        conn.flush_prepared_statement_cache();
        conn.close().map_err(|(_, e)| EngineError::from(e))
    }
}

fn bind_all(stmt: &mut rusqlite::Statement<'_>, bindings: &[Option<String>]) -> EngineResult<()> {
    for (i, value) in bindings.iter().enumerate() {
        if let Some(value) = value {
            stmt.raw_bind_parameter(i + 1, value.as_str())?;
        }
    }
    Ok(())
}

fn to_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CATALOG_TEMPLATES, Catalog};
    use crate::storage::{RetryPolicy, Store};
    use rusqlite::hooks::{AuthAction, AuthContext, Authorization};
    use std::sync::Arc;
    use tempfile::TempDir;
    use test_case::test_case;

    fn engine() -> SqliteEngine {
        SqliteEngine::in_memory(&ArchiveConfig::default()).unwrap()
    }

    fn run_write(engine: &SqliteEngine, sql: &str, params: &[&str]) -> EngineResult<Step> {
        let mut stmt = engine.compile(sql)?;
        for (i, p) in params.iter().enumerate() {
            engine.bind_text(&mut stmt, i + 1, p)?;
        }
        let step = engine.step(&mut stmt);
        engine.finalize(stmt);
        step
    }

    #[test]
    fn test_compile_reports_shape() {
        let engine = engine();
        let insert = engine
            .compile("INSERT INTO books (id, title, author) VALUES (?, ?, ?);")
            .unwrap();
        assert_eq!(insert.parameter_count(), 3);
        assert!(!insert.is_query());

        let select = engine.compile("SELECT * FROM books ORDER BY id;").unwrap();
        assert!(select.is_query());
        assert_eq!(engine.live_statements(), 2);

        engine.finalize(insert);
        engine.finalize(select);
        assert_eq!(engine.live_statements(), 0);
    }

    #[test]
    fn test_compile_error_is_failure() {
        let err = engine().compile("SELECT * FROM shelves;").unwrap_err();
        assert!(!err.is_busy());
        assert!(err.message().contains("no such table"));
    }

    #[test]
    fn test_bind_out_of_range() {
        let engine = engine();
        let mut stmt = engine.compile("DELETE FROM books WHERE id = ?;").unwrap();
        assert!(engine.bind_text(&mut stmt, 0, "1").is_err());
        assert!(engine.bind_text(&mut stmt, 2, "1").is_err());
        assert!(engine.bind_text(&mut stmt, 1, "1").is_ok());
    }

    #[test]
    fn test_write_then_scan() {
        let engine = engine();
        let insert = "INSERT INTO books (id, title, author) VALUES (?, ?, ?);";
        assert_eq!(run_write(&engine, insert, &["2", "B", "b"]).unwrap(), Step::Done);
        assert_eq!(run_write(&engine, insert, &["1", "A", "a"]).unwrap(), Step::Done);

        let mut select = engine.compile("SELECT * FROM books ORDER BY id;").unwrap();
        let mut ids = Vec::new();
        while let Step::Row(row) = engine.step(&mut select).unwrap() {
            ids.push(row.get(0).and_then(Value::as_integer).unwrap());
            assert_eq!(row.len(), 4);
        }
        assert_eq!(ids, vec![1, 2]);

        // Reset rewinds to a fresh scan.
        engine.reset(&mut select);
        assert!(matches!(engine.step(&mut select).unwrap(), Step::Row(_)));
    }

    #[test]
    fn test_duplicate_id_is_failure() {
        let engine = engine();
        let insert = "INSERT INTO books (id, title, author) VALUES (?, ?, ?);";
        run_write(&engine, insert, &["1", "A", "a"]).unwrap();
        let err = run_write(&engine, insert, &["1", "C", "c"]).unwrap_err();
        assert!(!err.is_busy());
        assert!(err.message().contains("UNIQUE"));
    }

    #[test]
    fn test_reset_clears_bindings() {
        let engine = engine();
        let mut stmt = engine
            .compile("INSERT INTO books (id, title, author) VALUES (?, ?, ?);")
            .unwrap();
        engine.bind_text(&mut stmt, 1, "1").unwrap();
        engine.bind_text(&mut stmt, 2, "A").unwrap();
        engine.bind_text(&mut stmt, 3, "a").unwrap();
        engine.reset(&mut stmt);
        engine.bind_text(&mut stmt, 1, "2").unwrap();

        // Title and author are NULL again, which NOT NULL rejects.
        let err = engine.step(&mut stmt).unwrap_err();
        assert!(err.message().contains("NOT NULL"));
    }

    #[test]
    fn test_busy_while_other_connection_writes() {
        let dir = TempDir::new().unwrap();
        let config = ArchiveConfig::default().with_db_path(dir.path().join("busy.db"));
        let engine = SqliteEngine::open(&config).unwrap();

        let other = Connection::open(&config.db_path).unwrap();
        other.execute_batch("BEGIN IMMEDIATE;").unwrap();

        let err = run_write(
            &engine,
            "INSERT INTO books (id, title, author) VALUES (?, ?, ?);",
            &["1", "A", "a"],
        )
        .unwrap_err();
        assert!(err.is_busy(), "expected busy, got {err:?}");

        other.execute_batch("ROLLBACK;").unwrap();
    }

    fn count_prepares(engine: &SqliteEngine) -> Arc<AtomicUsize> {
        let prepares = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&prepares);
        let guard = acquire_lock(&engine.conn);
        let conn = guard.as_ref().unwrap();
        // One authorizer callback per template: the statement kind, or the
        // first updated column
        conn.authorizer(Some(move |ctx: AuthContext<'_>| {
            let compiled = matches!(
                ctx.action,
                AuthAction::Insert { table_name: "books" }
                    | AuthAction::Delete { table_name: "books" }
                    | AuthAction::Update { table_name: "books", column_name: "title" }
                    | AuthAction::Select
            );
            if compiled {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            Authorization::Allow
        }));
        prepares
    }

    #[test_case(16; "default capacity")]
    #[test_case(1; "capacity below templates")]
    fn test_templates_prepared_once(capacity: usize) {
        let config = ArchiveConfig {
            statement_cache_capacity: capacity,
            ..ArchiveConfig::default()
        };
        let engine = SqliteEngine::in_memory(&config).unwrap();
        let prepares = count_prepares(&engine);
        let catalog = Catalog::new(Store::with_engine(engine, RetryPolicy::new(config.retry)));

        for id in 1..=10 {
            assert!(catalog.insert(id, "Title", "Author"));
            assert!(catalog.modify(id, "Other", "Author"));
            assert_eq!(catalog.find("Other").len(), 1);
            assert_eq!(catalog.list_all().len(), 1);
            assert!(catalog.remove(id));
        }

        assert_eq!(catalog.store().statements().compilations(), CATALOG_TEMPLATES as u64);
        assert_eq!(prepares.load(Ordering::SeqCst), CATALOG_TEMPLATES);
    }

    #[test]
    fn test_finalize_after_close_is_quiet() {
        let engine = engine();
        let stmt = engine.compile("SELECT 1;").unwrap();
        engine.close().unwrap();
        engine.finalize(stmt);
        assert_eq!(engine.live_statements(), 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let engine = engine();
        engine.close().unwrap();
        engine.close().unwrap();
        assert!(engine.compile("SELECT 1;").is_err());
    }
}
