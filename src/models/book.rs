//! The catalog record.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary key of a book. Supplied by the caller, never reassigned.
pub type BookId = i64;

/// Format `SQLite` uses for `CURRENT_TIMESTAMP`.
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One catalog entry.
///
/// Books only live for the duration of a single query result; the store is
/// the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Caller-supplied primary key.
    pub id: BookId,
    /// Title, never empty once validated by the shell.
    pub title: String,
    /// Author, never empty once validated by the shell.
    pub author: String,
    /// Insertion time assigned by the store.
    pub created_at: Option<NaiveDateTime>,
}

impl Book {
    /// Creates a book without a creation timestamp.
    #[must_use]
    pub fn new(id: BookId, title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            author: author.into(),
            created_at: None,
        }
    }

    /// Sets the creation timestamp.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: NaiveDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Parses a `created_at` column value, tolerating fractional seconds.
    #[must_use]
    pub fn parse_created_at(text: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(text, CREATED_AT_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
    }

    /// Returns true if `keyword` occurs in the title or author, ignoring
    /// ASCII case. Mirrors what `LIKE '%keyword%'` matches in `SQLite`.
    #[must_use]
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let needle = keyword.to_ascii_lowercase();
        self.title.to_ascii_lowercase().contains(&needle)
            || self.author.to_ascii_lowercase().contains(&needle)
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} '{}' by {}", self.id, self.title, self.author)
    }
}
