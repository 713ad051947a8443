//! Write batching.

use std::time::Duration;

use parking_lot::Mutex;

use super::{prepare_request, run_cursor, run_read, ExecutionStrategy};
use crate::error::{ExecutorError, ExecutorResult};
use crate::executor::{BatchOutcome, Cursor, Executor, ResultConsumer};
use crate::mapping::{BoundStatement, MappedStatement, RowBounds};
use crate::value::{Rows, Value};

/// Update count reported for a write that was queued rather than executed
pub const BATCH_UPDATE_RETURN_VALUE: i64 = i32::MIN as i64 + 1002;

#[derive(Debug)]
struct PendingBatch {
    statement_id: String,
    sql: String,
    timeout: Option<Duration>,
    parameters: Vec<Vec<Value>>,
}

/// Queues writes and sends them as batches.
///
/// Consecutive writes with the same statement id and SQL text share one
/// batch. Pending writes are flushed before any read or cursor so reads see
/// them, and discarded when the flush happens on rollback.
#[derive(Debug, Default)]
pub struct BatchStrategy {
    pending: Mutex<Vec<PendingBatch>>,
}

impl BatchStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued writes across all batches
    pub fn pending_writes(&self) -> usize {
        self.pending.lock().iter().map(|b| b.parameters.len()).sum()
    }
}

impl ExecutionStrategy for BatchStrategy {
    fn execute_write(
        &self,
        executor: &mut Executor,
        statement: &MappedStatement,
        parameter: &Value,
    ) -> ExecutorResult<i64> {
        let bound = statement.bound_statement(parameter);
        let request = prepare_request(executor, statement, parameter, &bound)?;

        let mut pending = self.pending.lock();
        match pending.last_mut() {
            Some(batch) if batch.statement_id == request.statement_id && batch.sql == request.sql => {
                batch.parameters.push(request.params);
            }
            _ => {
                tracing::debug!(statement = %request.statement_id, "batch_started");
                pending.push(PendingBatch {
                    statement_id: request.statement_id,
                    sql: request.sql,
                    timeout: request.timeout,
                    parameters: vec![request.params],
                });
            }
        }
        Ok(BATCH_UPDATE_RETURN_VALUE)
    }

    fn execute_read(
        &self,
        executor: &mut Executor,
        statement: &MappedStatement,
        parameter: &Value,
        bounds: RowBounds,
        consumer: Option<&mut dyn ResultConsumer>,
        bound: &BoundStatement,
    ) -> ExecutorResult<Rows> {
        self.flush_pending_writes(executor, false)?;
        run_read(executor, statement, parameter, bounds, consumer, bound)
    }

    fn execute_cursor(
        &self,
        executor: &mut Executor,
        statement: &MappedStatement,
        parameter: &Value,
        bounds: RowBounds,
        bound: &BoundStatement,
    ) -> ExecutorResult<Cursor> {
        self.flush_pending_writes(executor, false)?;
        run_cursor(executor, statement, parameter, bounds, bound)
    }

    fn flush_pending_writes(
        &self,
        executor: &mut Executor,
        is_rollback: bool,
    ) -> ExecutorResult<Vec<BatchOutcome>> {
        let batches = std::mem::take(&mut *self.pending.lock());
        if is_rollback {
            if !batches.is_empty() {
                tracing::debug!(discarded = batches.len(), "batches_discarded");
            }
            return Ok(Vec::new());
        }

        let mut outcomes = Vec::with_capacity(batches.len());
        for batch in batches {
            let result = executor.connection()?.execute_batch(
                &batch.statement_id,
                &batch.sql,
                &batch.parameters,
                batch.timeout,
            );
            match result {
                Ok(counts) => outcomes.push(BatchOutcome {
                    statement_id: batch.statement_id,
                    sql: batch.sql,
                    parameters: batch.parameters,
                    update_counts: counts,
                }),
                Err(source) => {
                    tracing::warn!(statement = %batch.statement_id, error = %source, "batch_flush_failed");
                    return Err(ExecutorError::Batch {
                        statement_id: batch.statement_id,
                        successful: outcomes,
                        source,
                    });
                }
            }
        }
        if !outcomes.is_empty() {
            tracing::debug!(batches = outcomes.len(), "batches_flushed");
        }
        Ok(outcomes)
    }
}
