//! Book catalog operations.
//!
//! Each operation is one parameterized statement run through the store.
//! Values always travel as bound parameters, never spliced into SQL.
//! Failures are logged and reported as `false` or an empty list; the log
//! carries the store's diagnostic text.

use crate::config::ArchiveConfig;
use crate::models::{Book, BookId};
use crate::storage::sqlite::{record_operation_metrics, status_label};
use crate::storage::{RetryPolicy, SqliteEngine, Store, StoreEngine};
use crate::Result;
use std::time::Instant;

/// Adds a book. Duplicate ids are rejected by the primary key.
pub const INSERT_BOOK: &str = "INSERT INTO books (id, title, author) VALUES (?, ?, ?);";
/// Removes a book. Removing a missing id is not an error.
pub const DELETE_BOOK: &str = "DELETE FROM books WHERE id = ?;";
/// Replaces title and author; the id never changes.
pub const UPDATE_BOOK: &str = "UPDATE books SET title = ?, author = ? WHERE id = ?;";
/// Substring search over title and author.
pub const SEARCH_BOOKS: &str =
    "SELECT * FROM books WHERE title LIKE ? OR author LIKE ? ORDER BY id;";
/// Every book.
pub const LIST_BOOKS: &str = "SELECT * FROM books ORDER BY id;";
/// Number of statement templates above; the compiled-statement cache never
/// holds fewer.
pub const CATALOG_TEMPLATES: usize = 5;

/// The book catalog.
#[derive(Debug)]
pub struct Catalog<E: StoreEngine = SqliteEngine> {
    store: Store<E>,
}

impl Catalog<SqliteEngine> {
    /// Opens the catalog database named by the config.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or its schema
    /// cannot be created.
    pub fn open(config: &ArchiveConfig) -> Result<Self> {
        Ok(Self::new(Store::open(config)?))
    }

    /// Opens a catalog over a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn open_in_memory(config: &ArchiveConfig) -> Result<Self> {
        let engine = SqliteEngine::in_memory(config)?;
        Ok(Self::new(Store::with_engine(engine, RetryPolicy::new(config.retry))))
    }
}

impl<E: StoreEngine> Catalog<E> {
    /// Creates a catalog over an open store.
    #[must_use]
    pub const fn new(store: Store<E>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &Store<E> {
        &self.store
    }

    /// Adds a book.
    pub fn insert(&self, id: BookId, title: &str, author: &str) -> bool {
        let start = Instant::now();
        let id_text = id.to_string();
        let added = self
            .store
            .execute_write(INSERT_BOOK, &[id_text.as_str(), title, author]);

        if added {
            tracing::info!("Book added: ID={id}, Title='{title}', Author='{author}'");
        } else {
            tracing::error!("Failed to add book with ID={id}");
        }
        record_operation_metrics("insert", start, status_label(added));
        added
    }

    /// Removes a book.
    pub fn remove(&self, id: BookId) -> bool {
        let start = Instant::now();
        let id_text = id.to_string();
        let removed = self.store.execute_write(DELETE_BOOK, &[id_text.as_str()]);

        if removed {
            tracing::info!("Book deleted: ID={id}");
        } else {
            tracing::error!("Failed to delete book with ID={id}");
        }
        record_operation_metrics("remove", start, status_label(removed));
        removed
    }

    /// Replaces the title and author of a book.
    pub fn modify(&self, id: BookId, title: &str, author: &str) -> bool {
        let start = Instant::now();
        let id_text = id.to_string();
        let updated = self
            .store
            .execute_write(UPDATE_BOOK, &[title, author, id_text.as_str()]);

        if updated {
            tracing::info!("Book updated: ID={id}, New Title='{title}', New Author='{author}'");
        } else {
            tracing::error!("Failed to update book with ID={id}");
        }
        record_operation_metrics("modify", start, status_label(updated));
        updated
    }

    /// Books whose title or author contains `keyword`, ordered by id.
    ///
    /// Matching follows the store's `LIKE`, which ignores ASCII case. `%`
    /// and `_` in the keyword keep their wildcard meaning.
    pub fn find(&self, keyword: &str) -> Vec<Book> {
        let start = Instant::now();
        let pattern = format!("%{keyword}%");
        let books = self
            .store
            .execute_read(SEARCH_BOOKS, &[pattern.as_str(), pattern.as_str()]);

        tracing::info!("Search for '{keyword}' returned {} results", books.len());
        record_operation_metrics("find", start, "success");
        books
    }

    /// Every book, ordered by id.
    pub fn list_all(&self) -> Vec<Book> {
        let start = Instant::now();
        let books = self.store.execute_read(LIST_BOOKS, &[]);

        tracing::info!("Retrieved {} books", books.len());
        record_operation_metrics("list_all", start, "success");
        books
    }

    /// Releases every statement and closes the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails to close.
    pub fn close(self) -> Result<()> {
        self.store.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::ScriptedEngine;

    fn catalog() -> Catalog {
        Catalog::open_in_memory(&ArchiveConfig::default()).unwrap()
    }

    #[test]
    fn test_insert_and_list() {
        let catalog = catalog();
        assert!(catalog.insert(2, "B", "b"));
        assert!(catalog.insert(1, "A", "a"));

        let books = catalog.list_all();
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].id, 1);
        assert_eq!(books[1].id, 2);
        assert!(books.iter().all(|b| b.created_at.is_some()));
    }

    #[test]
    fn test_duplicate_insert_keeps_original() {
        let catalog = catalog();
        assert!(catalog.insert(1, "A", "B"));
        assert!(!catalog.insert(1, "C", "D"));

        let books = catalog.list_all();
        assert_eq!(books.len(), 1);
        assert_eq!((books[0].title.as_str(), books[0].author.as_str()), ("A", "B"));
    }

    #[test]
    fn test_remove_missing_succeeds() {
        assert!(catalog().remove(99));
    }

    #[test]
    fn test_modify_keeps_id() {
        let catalog = catalog();
        catalog.insert(1, "A", "B");
        assert!(catalog.modify(1, "C", "D"));

        let books = catalog.list_all();
        assert_eq!(books, vec![Book { created_at: books[0].created_at, ..Book::new(1, "C", "D") }]);
    }

    #[test]
    fn test_modify_missing_succeeds() {
        assert!(catalog().modify(42, "C", "D"));
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let catalog = catalog();
        catalog.insert(1, "The Great Gatsby", "F. Scott Fitzgerald");
        catalog.insert(2, "Dune", "Frank Herbert");

        assert_eq!(catalog.find("gatsby").len(), 1);
        assert_eq!(catalog.find("FITZ")[0].id, 1);
        assert_eq!(catalog.find("xyz"), Vec::new());
        // Empty keyword matches everything.
        assert_eq!(catalog.find("").len(), 2);
    }

    #[test]
    fn test_find_keyword_is_bound_not_spliced() {
        let catalog = catalog();
        catalog.insert(1, "Robert'); DROP TABLE books;--", "Bobby");
        assert_eq!(catalog.find("'); DROP TABLE books;--").len(), 1);
        assert_eq!(catalog.list_all().len(), 1);
    }

    #[test]
    fn test_operations_use_store_templates() {
        let engine = ScriptedEngine::new();
        let log = engine.log();
        let catalog = Catalog::new(Store::with_engine(engine, RetryPolicy::default()));

        assert!(catalog.insert(1, "A", "a"));
        assert!(catalog.insert(2, "B", "b"));
        assert!(catalog.modify(1, "C", "c"));
        assert!(catalog.remove(2));
        catalog.find("x");
        catalog.list_all();

        assert_eq!(log.compiles(), 5);
        assert!(catalog.store().statements().contains(SEARCH_BOOKS));
        catalog.close().unwrap();
        assert_eq!(log.finalized(), 5);
    }
}
