//! Session Executor
//!
//! Runs mapped statements for one unit of work and memoizes read results in a
//! local store owned by the executor.
//!
//! ## Query path
//!
//! ```text
//! query ─► build key ─► query_with_key
//!                          │ depth 0 + flush_cache_required ─► clear store
//!                          │ depth += 1
//!                          ├─ Resolved hit ─► return cached rows
//!                          ├─ InFlight hit ─► ReentrantQuery
//!                          └─ miss ─► reserve InFlight ─► strategy.execute_read
//!                                     ─► remove placeholder ─► store result
//!                          │ depth -= 1
//!                          └─ depth 0 ─► drain deferred loads ─► scope clear
//! ```
//!
//! Nested queries issued by row mappers re-enter the same executor, so the
//! depth counter and the in-flight placeholders are what keep recursion
//! bounded. An executor has exactly one caller at a time; it is `Send` but
//! never shared.

mod caching;
mod cursor;
mod deferred;
pub mod strategy;

pub use caching::CachingExecutor;
pub use cursor::Cursor;
pub use deferred::{DeferredLoad, DeferredLoadQueue};
pub use strategy::{BatchStrategy, ExecutionStrategy, SimpleStrategy, BATCH_UPDATE_RETURN_VALUE};

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::cache::{build_cache_key, CacheKey, CacheSlot, LocalCache, OutputSnapshot};
use crate::config::CacheScope;
use crate::connection::Connection;
use crate::error::{ExecutorError, ExecutorResult};
use crate::mapping::{BoundStatement, CommandKind, MappedStatement, RowBounds, TargetType};
use crate::session::Configuration;
use crate::transaction::{effective_timeout, Transaction};
use crate::value::{Rows, Value};

/// Receives mapped rows one at a time instead of collecting them
pub trait ResultConsumer {
    /// Handle one row; `Break` stops the read
    fn consume(&mut self, row: Value, index: usize) -> ControlFlow<()>;
}

impl<F> ResultConsumer for F
where
    F: FnMut(Value, usize) -> ControlFlow<()>,
{
    fn consume(&mut self, row: Value, index: usize) -> ControlFlow<()> {
        self(row, index)
    }
}

/// Result of sending one batch of queued writes
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub statement_id: String,
    pub sql: String,
    /// One parameter set per queued write
    pub parameters: Vec<Vec<Value>>,
    /// Affected rows per parameter set
    pub update_counts: Vec<u64>,
}

/// Public contract of a session executor
pub trait SqlExecutor: Send {
    /// Run a write. Clears the local result store first.
    fn update(&mut self, statement: &MappedStatement, parameter: &Value) -> ExecutorResult<i64>;

    /// Run a read, answering from the local store when possible
    fn query(
        &mut self,
        statement: &MappedStatement,
        parameter: &Value,
        bounds: RowBounds,
        consumer: Option<&mut dyn ResultConsumer>,
    ) -> ExecutorResult<Rows>;

    /// Run a read with a precomputed key and bound statement
    fn query_with_key(
        &mut self,
        statement: &MappedStatement,
        parameter: &Value,
        bounds: RowBounds,
        consumer: Option<&mut dyn ResultConsumer>,
        key: CacheKey,
        bound: &BoundStatement,
    ) -> ExecutorResult<Rows>;

    /// Open a streaming read. Never touches the local store.
    fn query_cursor(
        &mut self,
        statement: &MappedStatement,
        parameter: &Value,
        bounds: RowBounds,
    ) -> ExecutorResult<Cursor>;

    fn flush_statements(&mut self) -> ExecutorResult<Vec<BatchOutcome>>;

    /// Clear the store, flush pending writes, and commit when `required`
    fn commit(&mut self, required: bool) -> ExecutorResult<()>;

    /// Clear the store, discard pending writes, and roll back when `required`
    fn rollback(&mut self, required: bool) -> ExecutorResult<()>;

    fn create_cache_key(
        &self,
        statement: &MappedStatement,
        parameter: &Value,
        bounds: RowBounds,
        bound: &BoundStatement,
    ) -> ExecutorResult<CacheKey>;

    /// Whether a completed result is stored for `key`
    fn is_cached(&self, statement: &MappedStatement, key: &CacheKey) -> ExecutorResult<bool>;

    /// Whether a query for `key` is executing further up the stack
    fn is_resolving(&self, key: &CacheKey) -> ExecutorResult<bool>;

    fn clear_local_cache(&mut self);

    /// Assign the result for `key` to `target.property`, now or once it resolves
    fn defer_load(
        &mut self,
        statement: &MappedStatement,
        target: &Value,
        property: &str,
        key: CacheKey,
        target_type: TargetType,
    ) -> ExecutorResult<()>;

    fn transaction(&mut self) -> ExecutorResult<&mut dyn Transaction>;

    /// Roll back (best effort), close the transaction, and release resources.
    /// Never fails; calling it again does nothing.
    fn close(&mut self, force_rollback: bool);

    fn is_closed(&self) -> bool;
}

/// The session executor
pub struct Executor {
    id: Uuid,
    configuration: Arc<Configuration>,
    strategy: Arc<dyn ExecutionStrategy>,
    transaction: Option<Box<dyn Transaction>>,
    local_cache: LocalCache,
    deferred_loads: DeferredLoadQueue,
    query_depth: usize,
    closed: bool,
}

impl Executor {
    pub fn new(
        configuration: Arc<Configuration>,
        transaction: Box<dyn Transaction>,
        strategy: Arc<dyn ExecutionStrategy>,
    ) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(executor = %id, "executor_opened");
        Executor {
            id,
            configuration,
            strategy,
            transaction: Some(transaction),
            local_cache: LocalCache::new(),
            deferred_loads: DeferredLoadQueue::new(),
            query_depth: 0,
            closed: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Current nesting depth of in-progress queries
    pub fn query_depth(&self) -> usize {
        self.query_depth
    }

    pub fn pending_deferred_loads(&self) -> usize {
        self.deferred_loads.len()
    }

    /// Connection of the current unit of work
    pub fn connection(&mut self) -> ExecutorResult<&mut dyn Connection> {
        Ok(self.transaction()?.connection()?)
    }

    /// Statement timeout capped by the transaction timeout
    pub fn statement_timeout(&self, statement: &MappedStatement) -> Option<Duration> {
        let transaction = self.transaction.as_ref().and_then(|tx| tx.timeout());
        effective_timeout(statement.timeout(), transaction)
    }

    fn ensure_open(&self) -> ExecutorResult<()> {
        if self.closed {
            return Err(ExecutorError::Closed);
        }
        Ok(())
    }

    fn lookup_or_execute(
        &mut self,
        statement: &MappedStatement,
        parameter: &Value,
        bounds: RowBounds,
        consumer: Option<&mut dyn ResultConsumer>,
        key: &CacheKey,
        bound: &BoundStatement,
    ) -> ExecutorResult<Rows> {
        if consumer.is_some() {
            let strategy = Arc::clone(&self.strategy);
            return strategy.execute_read(self, statement, parameter, bounds, consumer, bound);
        }

        match self.local_cache.get(key) {
            Some(CacheSlot::Resolved(rows)) => {
                let rows = Arc::clone(rows);
                tracing::debug!(executor = %self.id, statement = %statement.id(), "local_cache_hit");
                if statement.command() == CommandKind::ProcedureCall {
                    self.restore_outputs(key, parameter)?;
                }
                Ok(rows)
            }
            Some(CacheSlot::InFlight) => Err(ExecutorError::ReentrantQuery {
                statement: statement.id().to_string(),
                key: key.to_string(),
            }),
            None => self.query_from_database(statement, parameter, bounds, key, bound),
        }
    }

    fn query_from_database(
        &mut self,
        statement: &MappedStatement,
        parameter: &Value,
        bounds: RowBounds,
        key: &CacheKey,
        bound: &BoundStatement,
    ) -> ExecutorResult<Rows> {
        self.local_cache.reserve(key.clone());
        let strategy = Arc::clone(&self.strategy);
        let result = strategy.execute_read(self, statement, parameter, bounds, None, bound);
        self.local_cache.remove(key);

        let rows = result?;
        self.local_cache.put(key.clone(), Arc::clone(&rows));
        if statement.command() == CommandKind::ProcedureCall {
            let snapshot = self.capture_outputs(parameter, bound);
            self.local_cache.put_outputs(key.clone(), snapshot);
        }
        Ok(rows)
    }

    fn capture_outputs(&self, parameter: &Value, bound: &BoundStatement) -> OutputSnapshot {
        let accessor = self.configuration.accessor();
        bound
            .parameter_mappings()
            .iter()
            .filter(|m| m.mode.is_output())
            .map(|m| (m.property.clone(), accessor.get(parameter, &m.property)))
            .collect()
    }

    fn restore_outputs(&self, key: &CacheKey, parameter: &Value) -> ExecutorResult<()> {
        let Some(snapshot) = self.local_cache.outputs(key) else {
            return Ok(());
        };
        let accessor = self.configuration.accessor();
        for (property, value) in snapshot {
            accessor.set(parameter, property, value.clone())?;
        }
        Ok(())
    }

    /// Outermost-query completion: drain deferred loads, apply the scope clear
    fn complete_outermost(&mut self, scope: CacheScope, succeeded: bool) -> ExecutorResult<()> {
        if !succeeded {
            let dropped = self.deferred_loads.discard();
            if dropped > 0 {
                tracing::debug!(executor = %self.id, dropped, "deferred_loads_discarded");
            }
            return Ok(());
        }
        let drained = self
            .deferred_loads
            .drain_all(&self.local_cache, self.configuration.accessor());
        if scope == CacheScope::Statement {
            self.clear_local_cache();
        }
        drained
    }
}

impl SqlExecutor for Executor {
    fn update(&mut self, statement: &MappedStatement, parameter: &Value) -> ExecutorResult<i64> {
        self.ensure_open()?;
        tracing::debug!(executor = %self.id, statement = %statement.id(), "executing_update");
        self.clear_local_cache();
        let strategy = Arc::clone(&self.strategy);
        strategy.execute_write(self, statement, parameter)
    }

    fn query(
        &mut self,
        statement: &MappedStatement,
        parameter: &Value,
        bounds: RowBounds,
        consumer: Option<&mut dyn ResultConsumer>,
    ) -> ExecutorResult<Rows> {
        let bound = statement.bound_statement(parameter);
        let key = self.create_cache_key(statement, parameter, bounds, &bound)?;
        self.query_with_key(statement, parameter, bounds, consumer, key, &bound)
    }

    fn query_with_key(
        &mut self,
        statement: &MappedStatement,
        parameter: &Value,
        bounds: RowBounds,
        consumer: Option<&mut dyn ResultConsumer>,
        key: CacheKey,
        bound: &BoundStatement,
    ) -> ExecutorResult<Rows> {
        self.ensure_open()?;
        tracing::trace!(executor = %self.id, statement = %statement.id(), depth = self.query_depth, "executing_query");

        if self.query_depth == 0 && statement.flush_cache_required() {
            self.clear_local_cache();
        }

        self.query_depth += 1;
        let result = self.lookup_or_execute(statement, parameter, bounds, consumer, &key, bound);
        self.query_depth -= 1;

        if self.query_depth == 0 {
            self.complete_outermost(statement.cache_scope(), result.is_ok())?;
        }
        result
    }

    fn query_cursor(
        &mut self,
        statement: &MappedStatement,
        parameter: &Value,
        bounds: RowBounds,
    ) -> ExecutorResult<Cursor> {
        self.ensure_open()?;
        let bound = statement.bound_statement(parameter);
        let strategy = Arc::clone(&self.strategy);
        strategy.execute_cursor(self, statement, parameter, bounds, &bound)
    }

    fn flush_statements(&mut self) -> ExecutorResult<Vec<BatchOutcome>> {
        self.ensure_open()?;
        let strategy = Arc::clone(&self.strategy);
        strategy.flush_pending_writes(self, false)
    }

    fn commit(&mut self, required: bool) -> ExecutorResult<()> {
        if self.closed {
            return Err(ExecutorError::CommitOnClosed);
        }
        self.clear_local_cache();
        self.flush_statements()?;
        if required {
            tracing::debug!(executor = %self.id, "committing");
            self.transaction()?.commit()?;
        }
        Ok(())
    }

    fn rollback(&mut self, required: bool) -> ExecutorResult<()> {
        if self.closed {
            return Ok(());
        }
        self.clear_local_cache();
        let strategy = Arc::clone(&self.strategy);
        let flushed = strategy.flush_pending_writes(self, true);
        if required {
            tracing::debug!(executor = %self.id, "rolling_back");
            self.transaction()?.rollback()?;
        }
        flushed.map(|_| ())
    }

    fn create_cache_key(
        &self,
        statement: &MappedStatement,
        parameter: &Value,
        bounds: RowBounds,
        bound: &BoundStatement,
    ) -> ExecutorResult<CacheKey> {
        self.ensure_open()?;
        Ok(build_cache_key(&self.configuration, statement, parameter, bounds, bound))
    }

    fn is_cached(&self, _statement: &MappedStatement, key: &CacheKey) -> ExecutorResult<bool> {
        self.ensure_open()?;
        Ok(self.local_cache.resolved(key).is_some())
    }

    fn is_resolving(&self, key: &CacheKey) -> ExecutorResult<bool> {
        self.ensure_open()?;
        Ok(self.local_cache.is_in_flight(key))
    }

    fn clear_local_cache(&mut self) {
        if !self.closed {
            self.local_cache.clear();
        }
    }

    fn defer_load(
        &mut self,
        statement: &MappedStatement,
        target: &Value,
        property: &str,
        key: CacheKey,
        target_type: TargetType,
    ) -> ExecutorResult<()> {
        self.ensure_open()?;
        tracing::trace!(executor = %self.id, statement = %statement.id(), property, "defer_load");
        let task = DeferredLoad::new(target.clone(), property, key, target_type);
        self.deferred_loads
            .defer(task, &self.local_cache, self.configuration.accessor())
    }

    fn transaction(&mut self) -> ExecutorResult<&mut dyn Transaction> {
        self.ensure_open()?;
        match self.transaction.as_deref_mut() {
            Some(tx) => Ok(tx),
            None => Err(ExecutorError::Closed),
        }
    }

    fn close(&mut self, force_rollback: bool) {
        if self.closed {
            return;
        }
        if let Err(e) = self.rollback(force_rollback) {
            tracing::warn!(executor = %self.id, error = %e, "close_rollback_failed");
        }
        if let Some(mut tx) = self.transaction.take() {
            if let Err(e) = tx.close() {
                tracing::warn!(executor = %self.id, error = %e, "close_transaction_failed");
            }
        }
        self.local_cache = LocalCache::new();
        self.deferred_loads = DeferredLoadQueue::new();
        self.query_depth = 0;
        self.closed = true;
        tracing::debug!(executor = %self.id, "executor_closed");
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("id", &self.id)
            .field("query_depth", &self.query_depth)
            .field("cached_results", &self.local_cache.len())
            .field("deferred_loads", &self.deferred_loads.len())
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::mapping::StaticSqlSource;
    use crate::transaction::tests_support::{Journal, RecordingConnection};
    use crate::transaction::DirectTransaction;

    fn executor() -> Executor {
        let configuration = Arc::new(Configuration::new(Config::default()));
        let journal = Journal::shared();
        let tx = DirectTransaction::new(RecordingConnection::new(&journal), false);
        Executor::new(configuration, Box::new(tx), Arc::new(SimpleStrategy))
    }

    fn select() -> MappedStatement {
        MappedStatement::builder("listAll", CommandKind::Read, StaticSqlSource::new("SELECT * FROM t", vec![])).build()
    }

    #[test]
    fn test_closure_consumer() {
        let mut seen = Vec::new();
        let mut consumer = |row: Value, _index: usize| {
            seen.push(row);
            ControlFlow::Continue(())
        };
        assert!(consumer.consume(Value::from(1), 0).is_continue());
        assert_eq!(seen, vec![Value::from(1)]);
    }

    #[test]
    fn test_empty_read_is_cached() {
        let mut executor = executor();
        let statement = select();
        let rows = executor.query(&statement, &Value::Null, RowBounds::default(), None).unwrap();
        assert!(rows.is_empty());

        let bound = statement.bound_statement(&Value::Null);
        let key = executor.create_cache_key(&statement, &Value::Null, RowBounds::default(), &bound).unwrap();
        assert!(executor.is_cached(&statement, &key).unwrap());
        assert!(!executor.is_resolving(&key).unwrap());
        assert_eq!(executor.query_depth(), 0);
    }

    #[test]
    fn test_closed_executor_rejects_operations() {
        let mut executor = executor();
        let statement = select();
        let bound = statement.bound_statement(&Value::Null);
        let key = executor.create_cache_key(&statement, &Value::Null, RowBounds::default(), &bound).unwrap();
        executor.close(false);
        executor.close(true);

        assert!(executor.is_closed());
        assert!(matches!(
            executor.query(&statement, &Value::Null, RowBounds::default(), None),
            Err(ExecutorError::Closed)
        ));
        assert!(matches!(executor.update(&statement, &Value::Null), Err(ExecutorError::Closed)));
        assert!(matches!(executor.commit(true), Err(ExecutorError::CommitOnClosed)));
        assert!(executor.rollback(true).is_ok());
        assert!(executor.transaction().is_err());
        assert!(matches!(executor.is_cached(&statement, &key), Err(ExecutorError::Closed)));
        assert!(matches!(executor.is_resolving(&key), Err(ExecutorError::Closed)));
        executor.clear_local_cache();
    }
}
