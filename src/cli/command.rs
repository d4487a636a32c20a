//! Shell command parsing.
//!
//! One command per line. The first word picks the action; `add` and
//! `update` take an id followed by `<title>, <author>`, split on the first
//! comma with both halves trimmed.

use crate::models::BookId;
use std::str::FromStr;
use thiserror::Error as ThisError;

/// Usage line for `add`.
pub const ADD_USAGE: &str = "add <id> <title>, <author>";
/// Usage line for `update`.
pub const UPDATE_USAGE: &str = "update <id> <new_title>, <new_author>";

/// A parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add a new book.
    Add {
        /// Book id.
        id: BookId,
        /// Title.
        title: String,
        /// Author.
        author: String,
    },
    /// Delete a book by id.
    Delete {
        /// Book id.
        id: BookId,
    },
    /// Replace a book's title and author.
    Update {
        /// Book id.
        id: BookId,
        /// New title.
        title: String,
        /// New author.
        author: String,
    },
    /// Search titles and authors.
    Search {
        /// Text to look for.
        keyword: String,
    },
    /// Show every book.
    Display,
    /// Show the command list.
    Help,
    /// Show version information.
    Version,
    /// Toggle debug logging.
    Debug,
    /// Leave the shell.
    Exit,
    /// An action the shell does not know.
    Unknown(String),
}

/// Why a command line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum CommandError {
    /// No id after `add`, `delete` or `update`.
    #[error("Missing book ID")]
    MissingId,

    /// The id is not an integer.
    #[error("Invalid book ID: {0}")]
    InvalidId(String),

    /// No comma between title and author.
    #[error("Invalid format. Use: {0}")]
    InvalidFormat(&'static str),

    /// Title or author is blank.
    #[error("Title and author cannot be empty")]
    EmptyField,

    /// Nothing after `search`.
    #[error("Missing search keyword")]
    MissingKeyword,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (action, rest) = next_word(line);
        Ok(match action {
            "add" => {
                let (id, rest) = parse_id(rest)?;
                let (title, author) = split_fields(rest, ADD_USAGE)?;
                Self::Add { id, title, author }
            },
            "delete" => Self::Delete {
                id: parse_id(rest)?.0,
            },
            "update" => {
                let (id, rest) = parse_id(rest)?;
                let (title, author) = split_fields(rest, UPDATE_USAGE)?;
                Self::Update { id, title, author }
            },
            "search" => {
                let keyword = rest.trim();
                if keyword.is_empty() {
                    return Err(CommandError::MissingKeyword);
                }
                Self::Search {
                    keyword: keyword.to_string(),
                }
            },
            "display" => Self::Display,
            "help" => Self::Help,
            "version" => Self::Version,
            "debug" => Self::Debug,
            "exit" => Self::Exit,
            other => Self::Unknown(other.to_string()),
        })
    }
}

/// Splits off the first whitespace-delimited word.
fn next_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    input
        .find(char::is_whitespace)
        .map_or((input, ""), |end| input.split_at(end))
}

fn parse_id(input: &str) -> Result<(BookId, &str), CommandError> {
    let (word, rest) = next_word(input);
    if word.is_empty() {
        return Err(CommandError::MissingId);
    }
    let id = word
        .parse()
        .map_err(|_| CommandError::InvalidId(word.to_string()))?;
    Ok((id, rest))
}

fn split_fields(input: &str, usage: &'static str) -> Result<(String, String), CommandError> {
    let (title, author) = input
        .split_once(',')
        .ok_or(CommandError::InvalidFormat(usage))?;
    let (title, author) = (title.trim(), author.trim());
    if title.is_empty() || author.is_empty() {
        return Err(CommandError::EmptyField);
    }
    Ok((title.to_string(), author.to_string()))
}
