//! Statement execution.
//!
//! Every operation takes its statement's mutex for the whole
//! reset/bind/step sequence. Writes then hold the store's access lock
//! exclusively through the entire retry loop, sleeps included. Reads take
//! it shared for one step at a time, so readers interleave with each other
//! but never with a write in progress.
//!
//! Failures are logged and folded into `false` or a shorter result list.

use super::engine::{Step, StoreEngine};
use super::row::book_from_row;
use super::sqlite::{acquire_lock, acquire_read, acquire_write};
use super::statement_cache::SharedStatement;
use super::store::Store;
use crate::models::Book;
use crate::{Error, Result};

impl<E: StoreEngine> Store<E> {
    /// Runs a statement that produces no rows.
    ///
    /// Returns true once the statement runs to completion.
    pub fn execute_write(&self, sql: &str, params: &[&str]) -> bool {
        match self.try_execute_write(sql, params) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("SQL error: {e}");
                false
            },
        }
    }

    /// Runs a statement that produces no rows, reporting why it failed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Compile`], [`Error::Bind`],
    /// [`Error::ContentionExhausted`] or [`Error::Execution`].
    pub fn try_execute_write(&self, sql: &str, params: &[&str]) -> Result<()> {
        tracing::debug!("Executing SQL: {sql} with {} parameters", params.len());

        let statement = self.prepared(sql)?;
        let mut statement = acquire_lock(&statement);
        self.prepare_bindings(&mut statement, params)?;

        let _exclusive = acquire_write(&self.access);
        match self.retry.run(sql, || self.engine.step(&mut statement))? {
            Step::Done => Ok(()),
            Step::Row(_) => Err(Error::Execution(format!(
                "statement produced rows instead of completing: {sql}"
            ))),
        }
    }

    /// Runs a query and marshals every row into a [`Book`].
    ///
    /// A failure part way through the scan keeps the rows read before it.
    pub fn execute_read(&self, sql: &str, params: &[&str]) -> Vec<Book> {
        let mut books = Vec::new();
        if let Err(e) = self.collect_books(sql, params, &mut books) {
            tracing::error!("SQL error: {e}");
        }
        tracing::debug!("Query returned {} results", books.len());
        books
    }

    fn collect_books(&self, sql: &str, params: &[&str], books: &mut Vec<Book>) -> Result<()> {
        tracing::debug!("Executing query: {sql} with {} parameters", params.len());

        let statement = self.prepared(sql)?;
        let mut statement = acquire_lock(&statement);
        self.prepare_bindings(&mut statement, params)?;

        loop {
            let step = self.retry.run(sql, || {
                let _shared = acquire_read(&self.access);
                self.engine.step(&mut statement)
            })?;
            match step {
                Step::Row(row) => books.push(book_from_row(&row)?),
                Step::Done => return Ok(()),
            }
        }
    }

    fn prepared(&self, sql: &str) -> Result<SharedStatement<E::Statement>> {
        self.statements.get_or_compile(sql, |sql| self.engine.compile(sql))
    }

    /// Clears whatever the previous caller left behind, then binds `params`
    /// as text at positions 1..=n.
    fn prepare_bindings(&self, statement: &mut E::Statement, params: &[&str]) -> Result<()> {
        self.engine.reset(statement);
        for (i, value) in params.iter().enumerate() {
            let index = i + 1;
            self.engine
                .bind_text(statement, index, value)
                .map_err(|e| Error::Bind {
                    index,
                    cause: e.to_string(),
                })?;
        }
        Ok(())
    }
}
