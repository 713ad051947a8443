//! Execution Strategies
//!
//! How a statement actually reaches the connection. The [`Executor`] owns the
//! cache and lifecycle rules; a strategy only runs statements.
//!
//! | Strategy | Writes | Reads |
//! |----------|--------|-------|
//! | [`SimpleStrategy`] | executed immediately | executed immediately |
//! | [`BatchStrategy`] | queued until flush | flush pending writes, then execute |
//!
//! Strategies receive the executor itself so row mapping can issue nested
//! queries through it. They must not hold internal locks across such calls.

mod batch;
mod simple;

pub use batch::{BatchStrategy, BATCH_UPDATE_RETURN_VALUE};
pub use simple::SimpleStrategy;

use std::sync::Arc;

use super::{BatchOutcome, Cursor, Executor, ResultConsumer};
use crate::connection::{CallOutcome, StatementRequest};
use crate::error::{ExecutorError, ExecutorResult};
use crate::mapping::{BoundStatement, CommandKind, MappedStatement, RowBounds};
use crate::session::Configuration;
use crate::value::{Rows, Value};

/// Pluggable low-level execution
pub trait ExecutionStrategy: Send + Sync {
    /// Run a write and return its update count
    fn execute_write(
        &self,
        executor: &mut Executor,
        statement: &MappedStatement,
        parameter: &Value,
    ) -> ExecutorResult<i64>;

    /// Run a read and return the mapped rows.
    ///
    /// With a consumer, rows are handed to it instead and the returned
    /// collection is empty.
    fn execute_read(
        &self,
        executor: &mut Executor,
        statement: &MappedStatement,
        parameter: &Value,
        bounds: RowBounds,
        consumer: Option<&mut dyn ResultConsumer>,
        bound: &BoundStatement,
    ) -> ExecutorResult<Rows>;

    /// Open a streaming read
    fn execute_cursor(
        &self,
        executor: &mut Executor,
        statement: &MappedStatement,
        parameter: &Value,
        bounds: RowBounds,
        bound: &BoundStatement,
    ) -> ExecutorResult<Cursor>;

    /// Send (or, on rollback, discard) queued writes
    fn flush_pending_writes(
        &self,
        executor: &mut Executor,
        is_rollback: bool,
    ) -> ExecutorResult<Vec<BatchOutcome>>;
}

/// Positional parameter values for `bound`; output-only positions are `Null`
pub fn bind_parameters(
    configuration: &Configuration,
    bound: &BoundStatement,
    parameter: &Value,
) -> ExecutorResult<Vec<Value>> {
    bound
        .parameter_mappings()
        .iter()
        .map(|mapping| {
            if !mapping.mode.is_input() {
                return Ok(Value::Null);
            }
            let value = configuration.parameter_value(bound, parameter, &mapping.property);
            match mapping.data_type {
                Some(expected) if !value.is_null() && !expected.matches(&value) => {
                    Err(ExecutorError::Property {
                        path: mapping.property.clone(),
                        reason: format!("expected {expected}, found {}", value.data_type()),
                    })
                }
                _ => Ok(value),
            }
        })
        .collect()
}

/// Build the connection request for one invocation
pub fn prepare_request(
    executor: &Executor,
    statement: &MappedStatement,
    parameter: &Value,
    bound: &BoundStatement,
) -> ExecutorResult<StatementRequest> {
    let params = bind_parameters(executor.configuration(), bound, parameter)?;
    Ok(StatementRequest::new(statement.id(), bound.sql(), params)
        .with_timeout(executor.statement_timeout(statement)))
}

/// Write procedure output values back onto the parameter object.
///
/// `outputs` follow the declaration order of the output mappings.
pub fn bind_outputs(
    configuration: &Configuration,
    bound: &BoundStatement,
    parameter: &Value,
    outputs: Vec<Value>,
) -> ExecutorResult<()> {
    let accessor = configuration.accessor();
    let properties = bound
        .parameter_mappings()
        .iter()
        .filter(|m| m.mode.is_output())
        .map(|m| m.property.as_str());
    for (property, value) in properties.zip(outputs) {
        accessor.set(parameter, property, value)?;
    }
    Ok(())
}

/// Execute a write immediately
pub(crate) fn run_write(
    executor: &mut Executor,
    statement: &MappedStatement,
    parameter: &Value,
) -> ExecutorResult<i64> {
    let bound = statement.bound_statement(parameter);
    let request = prepare_request(executor, statement, parameter, &bound)?;

    if statement.command() == CommandKind::ProcedureCall {
        let outcome = executor.connection()?.call(&request)?;
        bind_outputs(executor.configuration(), &bound, parameter, outcome.outputs)?;
        return Ok(to_count(outcome.update_count));
    }
    let count = executor.connection()?.execute(&request)?;
    Ok(to_count(count))
}

/// Execute a read immediately, page it in memory and map every row
pub(crate) fn run_read(
    executor: &mut Executor,
    statement: &MappedStatement,
    parameter: &Value,
    bounds: RowBounds,
    mut consumer: Option<&mut dyn ResultConsumer>,
    bound: &BoundStatement,
) -> ExecutorResult<Rows> {
    let request = prepare_request(executor, statement, parameter, bound)?;

    // Connection borrow ends here: mapping may re-enter the executor
    let raw = if statement.command() == CommandKind::ProcedureCall {
        let CallOutcome { rows, outputs, .. } = executor.connection()?.call(&request)?;
        bind_outputs(executor.configuration(), bound, parameter, outputs)?;
        rows
    } else {
        executor.connection()?.query(&request)?
    };

    let mut results = Vec::new();
    let paged = raw.into_iter().skip(bounds.offset).take(bounds.limit);
    for (index, row) in paged.enumerate() {
        let mapped = match statement.result_mapping() {
            Some(mapping) => mapping.map_row(executor, statement, row)?,
            None => row,
        };
        match consumer.as_deref_mut() {
            Some(consumer) => {
                if consumer.consume(mapped, index).is_break() {
                    break;
                }
            }
            None => results.push(mapped),
        }
    }
    Ok(Rows::new(results))
}

/// Open a cursor that maps rows as they are fetched
pub(crate) fn run_cursor(
    executor: &mut Executor,
    statement: &MappedStatement,
    parameter: &Value,
    bounds: RowBounds,
    bound: &BoundStatement,
) -> ExecutorResult<Cursor> {
    let transform = match statement.result_mapping() {
        None => None,
        Some(mapping) => match mapping.row_transform() {
            Some(transform) => Some(Arc::clone(transform)),
            None => return Err(ExecutorError::NestedMappingInCursor(statement.id().to_string())),
        },
    };
    let request = prepare_request(executor, statement, parameter, bound)?;
    let stream = executor.connection()?.open_cursor(&request)?;
    let cursor = Cursor::new(statement.id(), stream, bounds);
    Ok(match transform {
        Some(transform) => cursor.with_transform(transform),
        None => cursor,
    })
}

fn to_count(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}
