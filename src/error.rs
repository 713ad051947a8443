//! Error types for executors, connections and transactions.

use std::time::Duration;

use crate::executor::BatchOutcome;

/// Failure reported by a connection or transaction
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DbError {
    /// Connectivity lost or connection unusable
    #[error("Connection failure: {0}")]
    Connection(String),

    /// Constraint violated by a write
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Statement exceeded its timeout
    #[error("Statement timed out after {0:?}")]
    Timeout(Duration),

    /// Operation attempted on a closed transaction
    #[error("Transaction is already closed")]
    TransactionClosed,

    /// Any other driver-level failure
    #[error("{0}")]
    Other(String),
}

/// Executor error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutorError {
    /// Operation invoked after `close`
    #[error("Executor was closed.")]
    Closed,

    /// `commit` invoked after `close`
    #[error("Cannot commit, transaction is already closed")]
    CommitOnClosed,

    /// Failure surfaced by the connection or transaction
    #[error(transparent)]
    Database(#[from] DbError),

    /// Batch flush failed part way; `successful` holds the batches that ran
    #[error("Batch statement '{statement_id}' failed after {} successful batch(es): {source}", .successful.len())]
    Batch {
        statement_id: String,
        successful: Vec<BatchOutcome>,
        source: DbError,
    },

    /// A deferred load's source entry was not resolved when the queue drained
    #[error("Deferred load of property '{property}' has no resolved value for key {key}")]
    UnresolvedDeferredLoad { property: String, key: String },

    /// A query re-entered itself while its own result was still being resolved
    #[error("Statement '{statement}' re-entered while resolving key {key}; use defer_load for circular associations")]
    ReentrantQuery { statement: String, key: String },

    /// A single-valued target received several rows
    #[error("Statement returned more than one row, where no more than one was expected ({count} rows)")]
    TooManyRows { count: usize },

    /// A property could not be read or written
    #[error("Cannot access property '{path}': {reason}")]
    Property { path: String, reason: String },

    /// Cursor requested for a statement whose mapping needs the executor
    #[error("Statement '{0}' maps rows with nested queries and cannot be read through a cursor")]
    NestedMappingInCursor(String),

    /// Statement id not registered
    #[error("Mapped statement '{0}' is not registered")]
    UnknownStatement(String),

    /// Statement id registered twice
    #[error("Mapped statement '{0}' is already registered")]
    DuplicateStatement(String),

    /// Shared caching requested for a procedure call with output parameters
    #[error("Caching stored procedures with OUT params is not supported. Please configure use_cache=false in '{0}' statement.")]
    OutParametersNotCacheable(String),
}

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

impl ExecutorError {
    /// Whether this error reports use of a closed executor
    pub fn is_closed(&self) -> bool {
        matches!(self, ExecutorError::Closed | ExecutorError::CommitOnClosed)
    }
}
