//! Second-level cache decorator.

use std::sync::Arc;

use super::{BatchOutcome, Cursor, ResultConsumer, SqlExecutor};
use crate::cache::{CacheKey, TransactionalCacheManager};
use crate::error::{ExecutorError, ExecutorResult};
use crate::mapping::{BoundStatement, CommandKind, MappedStatement, RowBounds, TargetType};
use crate::transaction::Transaction;
use crate::value::{Rows, Value};

/// Wraps an executor with the shared, cross-session cache.
///
/// Reads of statements that carry a shared cache and have `use_cache` set are
/// answered from it. Results are staged per unit of work and only published
/// on commit. Nested queries issued by row mappers go to the wrapped executor
/// and never consult the shared cache.
pub struct CachingExecutor<E> {
    delegate: E,
    staging: TransactionalCacheManager,
}

impl<E: SqlExecutor> CachingExecutor<E> {
    pub fn new(delegate: E) -> Self {
        CachingExecutor {
            delegate,
            staging: TransactionalCacheManager::new(),
        }
    }

    pub fn delegate(&self) -> &E {
        &self.delegate
    }

    pub fn delegate_mut(&mut self) -> &mut E {
        &mut self.delegate
    }

    /// Fails once the wrapped executor is closed, before any shared cache is touched
    fn ensure_open(&self) -> ExecutorResult<()> {
        if self.delegate.is_closed() {
            return Err(ExecutorError::Closed);
        }
        Ok(())
    }

    fn flush_cache_if_required(&mut self, statement: &MappedStatement) {
        if let Some(cache) = statement.cache() {
            if statement.flush_cache_required() {
                self.staging.clear(cache);
            }
        }
    }
}

fn ensure_no_out_params(statement: &MappedStatement, bound: &BoundStatement) -> ExecutorResult<()> {
    if statement.command() == CommandKind::ProcedureCall
        && bound.parameter_mappings().iter().any(|m| m.mode.is_output())
    {
        return Err(ExecutorError::OutParametersNotCacheable(statement.id().to_string()));
    }
    Ok(())
}

impl<E: SqlExecutor> SqlExecutor for CachingExecutor<E> {
    fn update(&mut self, statement: &MappedStatement, parameter: &Value) -> ExecutorResult<i64> {
        self.ensure_open()?;
        self.flush_cache_if_required(statement);
        self.delegate.update(statement, parameter)
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
        let Some(cache) = statement.cache() else {
            return self
                .delegate
                .query_with_key(statement, parameter, bounds, consumer, key, bound);
        };

        self.flush_cache_if_required(statement);
        if !statement.use_cache() || consumer.is_some() {
            return self
                .delegate
                .query_with_key(statement, parameter, bounds, consumer, key, bound);
        }

        ensure_no_out_params(statement, bound)?;
        if let Some(rows) = self.staging.get(cache, &key) {
            tracing::debug!(cache = %cache.id(), statement = %statement.id(), "shared_cache_hit");
            return Ok(rows);
        }
        let rows = self
            .delegate
            .query_with_key(statement, parameter, bounds, None, key.clone(), bound)?;
        self.staging.put(cache, key, Arc::clone(&rows));
        Ok(rows)
    }

    fn query_cursor(
        &mut self,
        statement: &MappedStatement,
        parameter: &Value,
        bounds: RowBounds,
    ) -> ExecutorResult<Cursor> {
        self.ensure_open()?;
        self.flush_cache_if_required(statement);
        self.delegate.query_cursor(statement, parameter, bounds)
    }

    fn flush_statements(&mut self) -> ExecutorResult<Vec<BatchOutcome>> {
        self.delegate.flush_statements()
    }

    fn commit(&mut self, required: bool) -> ExecutorResult<()> {
        self.delegate.commit(required)?;
        self.staging.commit();
        Ok(())
    }

    fn rollback(&mut self, required: bool) -> ExecutorResult<()> {
        if self.delegate.is_closed() {
            return Ok(());
        }
        let result = self.delegate.rollback(required);
        if required {
            self.staging.rollback();
        }
        result
    }

    fn create_cache_key(
        &self,
        statement: &MappedStatement,
        parameter: &Value,
        bounds: RowBounds,
        bound: &BoundStatement,
    ) -> ExecutorResult<CacheKey> {
        self.delegate.create_cache_key(statement, parameter, bounds, bound)
    }

    fn is_cached(&self, statement: &MappedStatement, key: &CacheKey) -> ExecutorResult<bool> {
        self.delegate.is_cached(statement, key)
    }

    fn is_resolving(&self, key: &CacheKey) -> ExecutorResult<bool> {
        self.delegate.is_resolving(key)
    }

    fn clear_local_cache(&mut self) {
        self.delegate.clear_local_cache();
    }

    fn defer_load(
        &mut self,
        statement: &MappedStatement,
        target: &Value,
        property: &str,
        key: CacheKey,
        target_type: TargetType,
    ) -> ExecutorResult<()> {
        self.delegate
            .defer_load(statement, target, property, key, target_type)
    }

    fn transaction(&mut self) -> ExecutorResult<&mut dyn Transaction> {
        self.delegate.transaction()
    }

    fn close(&mut self, force_rollback: bool) {
        if self.delegate.is_closed() {
            return;
        }
        if force_rollback {
            self.staging.rollback();
        } else {
            self.staging.commit();
        }
        self.delegate.close(force_rollback);
    }

    fn is_closed(&self) -> bool {
        self.delegate.is_closed()
    }
}
