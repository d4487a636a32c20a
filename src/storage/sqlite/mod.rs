//! `SQLite` backend for the store.
//!
//! ## Module Structure
//!
//! - [`connection`]: lock acquisition, pragmas and schema creation
//! - [`engine`]: the [`StoreEngine`](crate::storage::StoreEngine) implementation
//! - [`metrics`]: catalog operation metrics

mod connection;
mod engine;
mod metrics;

pub use connection::{
    CREATE_BOOKS_TABLE, CREATE_TITLE_AUTHOR_INDEX, acquire_lock, acquire_read, acquire_write,
    configure_connection, ensure_schema,
};
pub use engine::{SqliteEngine, SqliteStatement};
pub use metrics::{record_operation_metrics, status_label};
