//! Catalog integration tests against real `SQLite` databases.
//!
//! Covers the catalog contract end to end:
//! - Idempotent delete and primary-key uniqueness
//! - Insert/update round-trips and id ordering
//! - Case-insensitive substring search
//! - Busy handling against a second connection
//! - Persistence across reopen

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use book_archive::{ArchiveConfig, Book, Catalog, RetryConfig};
use rusqlite::Connection;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

fn config_in(dir: &TempDir) -> ArchiveConfig {
    ArchiveConfig::default()
        .with_db_path(dir.path().join("books.db"))
        .with_log_file(None)
}

fn open(dir: &TempDir) -> Catalog {
    Catalog::open(&config_in(dir)).expect("Failed to open catalog")
}

fn summary(books: &[Book]) -> Vec<(i64, &str, &str)> {
    books
        .iter()
        .map(|b| (b.id, b.title.as_str(), b.author.as_str()))
        .collect()
}

// ============================================================================
// Record operations
// ============================================================================

#[test]
fn test_delete_missing_id_succeeds() {
    let dir = TempDir::new().unwrap();
    let catalog = open(&dir);
    assert!(catalog.remove(404));
    assert!(catalog.list_all().is_empty());
}

#[test]
fn test_duplicate_id_rejected() {
    let dir = TempDir::new().unwrap();
    let catalog = open(&dir);

    assert!(catalog.insert(1, "A", "B"));
    assert!(!catalog.insert(1, "C", "D"));
    assert_eq!(summary(&catalog.list_all()), vec![(1, "A", "B")]);
}

#[test]
fn test_insert_update_round_trip() {
    let dir = TempDir::new().unwrap();
    let catalog = open(&dir);

    assert!(catalog.insert(1, "A", "B"));
    assert_eq!(summary(&catalog.list_all()), vec![(1, "A", "B")]);

    assert!(catalog.modify(1, "C", "D"));
    assert_eq!(summary(&catalog.list_all()), vec![(1, "C", "D")]);
}

#[test]
fn test_search_substring_case_insensitive() {
    let dir = TempDir::new().unwrap();
    let catalog = open(&dir);
    catalog.insert(1, "The Great Gatsby", "F. Scott Fitzgerald");

    assert_eq!(
        summary(&catalog.find("Gatsby")),
        vec![(1, "The Great Gatsby", "F. Scott Fitzgerald")]
    );
    assert_eq!(catalog.find("gAtSbY").len(), 1);
    assert_eq!(catalog.find("scott").len(), 1);
    assert!(catalog.find("xyz").is_empty());
}

#[test]
fn test_results_ordered_by_id() {
    let dir = TempDir::new().unwrap();
    let catalog = open(&dir);
    for id in [5, 3, 9, 1, 7] {
        assert!(catalog.insert(id, &format!("Book {id}"), "Same Author"));
    }

    let ids: Vec<_> = catalog.list_all().iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![1, 3, 5, 7, 9]);

    let ids: Vec<_> = catalog.find("same").iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![1, 3, 5, 7, 9]);
}

#[test]
fn test_catalog_scenario() {
    let dir = TempDir::new().unwrap();
    let catalog = open(&dir);

    assert!(catalog.insert(1, "Dune", "Frank Herbert"));
    assert!(catalog.insert(2, "Emma", "Jane Austen"));
    assert_eq!(
        summary(&catalog.list_all()),
        vec![(1, "Dune", "Frank Herbert"), (2, "Emma", "Jane Austen")]
    );

    assert!(catalog.remove(2));
    assert_eq!(summary(&catalog.list_all()), vec![(1, "Dune", "Frank Herbert")]);

    assert!(catalog.find("xyz").is_empty());
}

#[test]
fn test_created_at_assigned_by_store() {
    let dir = TempDir::new().unwrap();
    let catalog = open(&dir);
    catalog.insert(1, "A", "B");

    let created_at = catalog.list_all()[0].created_at.expect("created_at missing");
    let now = chrono::Utc::now().naive_utc();
    assert!((now - created_at).num_minutes().abs() < 5);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_books_persist_across_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let catalog = open(&dir);
        catalog.insert(1, "Dune", "Frank Herbert");
        catalog.close().unwrap();
    }

    let catalog = open(&dir);
    assert_eq!(summary(&catalog.list_all()), vec![(1, "Dune", "Frank Herbert")]);
}

#[test]
fn test_schema_created_with_index() {
    let dir = TempDir::new().unwrap();
    drop(open(&dir));

    let conn = Connection::open(dir.path().join("books.db")).unwrap();
    let index: String = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'books' \
             AND name = 'idx_books_title_author'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(index, "idx_books_title_author");
}

#[test]
fn test_index_creation_failure_is_not_fatal() {
    let dir = TempDir::new().unwrap();
    let conn = Connection::open(dir.path().join("books.db")).unwrap();
    conn.execute_batch("CREATE TABLE idx_books_title_author (x INTEGER);")
        .unwrap();
    drop(conn);

    let catalog = open(&dir);
    assert!(catalog.insert(1, "Dune", "Herbert"));
    assert!(catalog.insert(2, "Emma", "Austen"));
    assert_eq!(
        summary(&catalog.list_all()),
        vec![(1, "Dune", "Herbert"), (2, "Emma", "Austen")]
    );
}

#[test]
fn test_unopenable_database_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = ArchiveConfig::default()
        .with_db_path(dir.path().join("no").join("such").join("dir.db"))
        .with_log_file(None);
    assert!(Catalog::open(&config).is_err());
}

// ============================================================================
// Contention
// ============================================================================

#[test]
fn test_write_fails_after_retries_while_locked() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir).with_retry(RetryConfig {
        max_retries: 5,
        base_delay_ms: 2,
    });
    let catalog = Catalog::open(&config).unwrap();

    let other = Connection::open(&config.db_path).unwrap();
    other.execute_batch("BEGIN IMMEDIATE;").unwrap();

    let start = Instant::now();
    assert!(!catalog.insert(1, "A", "B"));
    // 2 + 4 + 8 + 16 + 32 ms of backoff.
    assert!(start.elapsed() >= Duration::from_millis(62));

    // WAL readers are not blocked by the pending writer.
    assert!(catalog.list_all().is_empty());

    other.execute_batch("ROLLBACK;").unwrap();
    assert!(catalog.insert(1, "A", "B"));
}

#[test]
fn test_write_succeeds_once_lock_released() {
    let dir = TempDir::new().unwrap();
    let catalog = open(&dir);

    let other = Connection::open(dir.path().join("books.db")).unwrap();
    other.execute_batch("BEGIN IMMEDIATE;").unwrap();
    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(25));
        other.execute_batch("COMMIT;").unwrap();
    });

    // Default backoff waits up to 310 ms, well past the release.
    assert!(catalog.insert(1, "A", "B"));
    releaser.join().unwrap();
    assert_eq!(catalog.list_all().len(), 1);
}
