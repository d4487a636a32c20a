//! Data models for the book archive.

mod book;

pub use book::{Book, BookId, CREATED_AT_FORMAT};
