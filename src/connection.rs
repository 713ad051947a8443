//! Driver-facing connection contract.
//!
//! A [`Connection`] runs fully bound SQL and returns raw rows. Executors reach
//! it through their [`Transaction`](crate::transaction::Transaction) and never
//! hold it across a row-mapping callback.

use std::time::Duration;

use crate::error::DbError;
use crate::value::Value;

/// One statement execution request
#[derive(Debug, Clone, PartialEq)]
pub struct StatementRequest {
    /// Id of the mapped statement (diagnostics only)
    pub statement_id: String,
    pub sql: String,
    /// Positional parameters; output-only positions hold `Null`
    pub params: Vec<Value>,
    pub timeout: Option<Duration>,
}

impl StatementRequest {
    pub fn new(statement_id: impl Into<String>, sql: impl Into<String>, params: Vec<Value>) -> Self {
        StatementRequest {
            statement_id: statement_id.into(),
            sql: sql.into(),
            params,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Result of a stored procedure call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOutcome {
    pub rows: Vec<Value>,
    pub update_count: u64,
    /// Values of the output parameters, in declaration order
    pub outputs: Vec<Value>,
}

/// Forward-only stream of raw rows backing a cursor
pub trait RowStream: Iterator<Item = Result<Value, DbError>> + Send {
    /// Release the underlying resource
    fn close(&mut self) -> Result<(), DbError> {
        Ok(())
    }
}

/// Row stream over rows already in memory
#[derive(Debug)]
pub struct BufferedRows {
    rows: std::vec::IntoIter<Value>,
}

impl BufferedRows {
    pub fn new(rows: Vec<Value>) -> Self {
        BufferedRows {
            rows: rows.into_iter(),
        }
    }
}

impl Iterator for BufferedRows {
    type Item = Result<Value, DbError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next().map(Ok)
    }
}

impl RowStream for BufferedRows {}

/// A live connection to the relational store
pub trait Connection: Send {
    /// Run a read and return every row
    fn query(&mut self, request: &StatementRequest) -> Result<Vec<Value>, DbError>;

    /// Run a write and return the affected row count
    fn execute(&mut self, request: &StatementRequest) -> Result<u64, DbError>;

    /// Run one SQL text once per parameter set
    fn execute_batch(
        &mut self,
        statement_id: &str,
        sql: &str,
        batch: &[Vec<Value>],
        timeout: Option<Duration>,
    ) -> Result<Vec<u64>, DbError> {
        batch
            .iter()
            .map(|params| {
                let request = StatementRequest::new(statement_id, sql, params.clone())
                    .with_timeout(timeout);
                self.execute(&request)
            })
            .collect()
    }

    /// Call a stored procedure
    fn call(&mut self, request: &StatementRequest) -> Result<CallOutcome, DbError> {
        Ok(CallOutcome {
            rows: self.query(request)?,
            ..CallOutcome::default()
        })
    }

    /// Open a streaming read
    fn open_cursor(&mut self, request: &StatementRequest) -> Result<Box<dyn RowStream>, DbError> {
        Ok(Box::new(BufferedRows::new(self.query(request)?)))
    }

    fn auto_commit(&self) -> bool;

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), DbError>;

    fn commit(&mut self) -> Result<(), DbError>;

    fn rollback(&mut self) -> Result<(), DbError>;

    fn close(&mut self) -> Result<(), DbError>;
}
