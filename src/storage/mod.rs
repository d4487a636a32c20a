//! Storage layer.
//!
//! The generic core of the store is written against [`StoreEngine`]:
//! - **Statement cache**: compiled statements keyed by SQL text
//! - **Executor**: bind, lock, step with busy-retry, marshal rows
//! - **Store**: owns the engine, the cache and the locking discipline
//!
//! [`SqliteEngine`] is the production engine.

// Allow significant_drop_tightening - statement guards span the whole
// reset/bind/step sequence.
#![allow(clippy::significant_drop_tightening)]

pub mod engine;
mod executor;
pub mod retry;
pub mod row;
pub mod sqlite;
pub mod statement_cache;
mod store;

pub use engine::{EngineError, EngineResult, Step, StoreEngine};
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};
pub use row::{Row, Value, book_from_row};
pub use sqlite::{SqliteEngine, SqliteStatement};
pub use statement_cache::{SharedStatement, StatementCache};
pub use store::Store;
