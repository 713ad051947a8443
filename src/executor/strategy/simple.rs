use super::{run_cursor, run_read, run_write, ExecutionStrategy};
use crate::error::ExecutorResult;
use crate::executor::{BatchOutcome, Cursor, Executor, ResultConsumer};
use crate::mapping::{BoundStatement, MappedStatement, RowBounds};
use crate::value::{Rows, Value};

/// Runs every statement as soon as it is issued
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleStrategy;

impl ExecutionStrategy for SimpleStrategy {
    fn execute_write(
        &self,
        executor: &mut Executor,
        statement: &MappedStatement,
        parameter: &Value,
    ) -> ExecutorResult<i64> {
        run_write(executor, statement, parameter)
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
        run_cursor(executor, statement, parameter, bounds, bound)
    }

    fn flush_pending_writes(
        &self,
        _executor: &mut Executor,
        _is_rollback: bool,
    ) -> ExecutorResult<Vec<BatchOutcome>> {
        Ok(Vec::new())
    }
}
