//! Fixed-width book table.

use crate::models::Book;
use std::borrow::Cow;
use std::io::{self, Write};

/// Width of the id column.
pub const ID_WIDTH: usize = 5;
/// Width of the title column.
pub const TITLE_WIDTH: usize = 30;
/// Width of the author column.
pub const AUTHOR_WIDTH: usize = 20;
/// Length of the rule under the header.
pub const RULE_WIDTH: usize = 60;

/// Shortens `value` to `width` characters, ending in `...` when cut.
#[must_use]
pub fn truncate(value: &str, width: usize) -> Cow<'_, str> {
    if value.chars().count() <= width {
        return Cow::Borrowed(value);
    }
    let kept: String = value.chars().take(width.saturating_sub(3)).collect();
    Cow::Owned(format!("{kept}..."))
}

/// Writes `books` as a right-aligned table with a header row.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_table<W: Write>(writer: &mut W, books: &[Book]) -> io::Result<()> {
    writeln!(
        writer,
        "{:>ID_WIDTH$} | {:>TITLE_WIDTH$} | {:>AUTHOR_WIDTH$}",
        "ID", "Title", "Author"
    )?;
    writeln!(writer, "{}", "-".repeat(RULE_WIDTH))?;
    for book in books {
        writeln!(
            writer,
            "{:>ID_WIDTH$} | {:>TITLE_WIDTH$} | {:>AUTHOR_WIDTH$}",
            book.id,
            truncate(&book.title, TITLE_WIDTH),
            truncate(&book.author, AUTHOR_WIDTH)
        )?;
    }
    Ok(())
}
