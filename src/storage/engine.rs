//! Store engine trait.
//!
//! The execution engine, statement cache and locking discipline are written
//! against [`StoreEngine`]. The engine only knows how to compile, bind and
//! step statements on its one connection; it never decides when a caller may
//! step or how contention is retried.

use super::row::Row;
use thiserror::Error as ThisError;

/// Result type for engine calls.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Errors reported by a store engine.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum EngineError {
    /// The store is held by a conflicting operation; the call may succeed if
    /// repeated later.
    #[error("{0}")]
    Busy(String),

    /// Any other failure, carrying the engine's diagnostic text.
    #[error("{0}")]
    Failure(String),
}

impl EngineError {
    /// Returns true for contention errors.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }

    /// Returns the engine's diagnostic text.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Busy(msg) | Self::Failure(msg) => msg,
        }
    }
}

/// Outcome of a single step.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The statement produced a row.
    Row(Row),
    /// The statement ran to completion.
    Done,
}

/// An embedded transactional store with a single connection.
///
/// Statements returned by [`compile`](Self::compile) belong to whoever holds
/// them (the statement cache) and must be handed back through
/// [`finalize`](Self::finalize) before [`close`](Self::close).
pub trait StoreEngine: Send + Sync {
    /// Compiled statement handle.
    type Statement: Send;

    /// Compiles one SQL template.
    fn compile(&self, sql: &str) -> EngineResult<Self::Statement>;

    /// Rewinds a statement and clears every bound parameter.
    fn reset(&self, statement: &mut Self::Statement);

    /// Binds `value` as text at the 1-based `index`. The engine keeps its own
    /// copy of the value.
    fn bind_text(
        &self,
        statement: &mut Self::Statement,
        index: usize,
        value: &str,
    ) -> EngineResult<()>;

    /// Advances the statement by one row.
    fn step(&self, statement: &mut Self::Statement) -> EngineResult<Step>;

    /// Releases a compiled statement.
    fn finalize(&self, statement: Self::Statement);

    /// Closes the connection. Later calls fail.
    fn close(&self) -> EngineResult<()>;
}
