//! Engine-neutral result rows and their conversion to [`Book`].

use crate::models::Book;
use crate::{Error, Result};
use std::fmt;

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// 64-bit integer.
    Integer(i64),
    /// Floating point number.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Value {
    /// Returns the value as an integer, converting numeric text.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the value as text; `NULL` has none.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Integer(v) => Some(v.to_string()),
            Self::Real(v) => Some(v.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
            Self::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// One result row, columns in statement order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row(Vec<Value>);

impl Row {
    /// Creates a row from column values.
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Returns the value at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// Converts a `SELECT * FROM books` row into a [`Book`].
///
/// Columns are `id, title, author, created_at`. A `NULL` title or author
/// becomes an empty string; an unparseable timestamp becomes `None`.
///
/// # Errors
///
/// Returns [`Error::Execution`] if the id column is missing or not an integer.
pub fn book_from_row(row: &Row) -> Result<Book> {
    let id = row
        .get(0)
        .and_then(Value::as_integer)
        .ok_or_else(|| Error::Execution(format!("row has no integer id: {row:?}")))?;
    let text = |index: usize| row.get(index).and_then(Value::as_text).unwrap_or_default();

    let mut book = Book::new(id, text(1), text(2));
    if let Some(created_at) = row
        .get(3)
        .and_then(Value::as_text)
        .and_then(|s| Book::parse_created_at(&s))
    {
        book = book.with_created_at(created_at);
    }
    Ok(book)
}
