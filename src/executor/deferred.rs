//! Deferred association loading.
//!
//! A row mapper that needs the result of a query still resolving further up
//! the stack registers a [`DeferredLoad`] instead of recursing. The outermost
//! query drains the queue once every nested query has completed.

use std::collections::VecDeque;

use crate::cache::{CacheKey, LocalCache};
use crate::error::{ExecutorError, ExecutorResult};
use crate::mapping::{PropertyAccessor, ResultExtractor, TargetType};
use crate::value::Value;

/// Pending assignment of a cached result to a property of a result object
#[derive(Debug, Clone)]
pub struct DeferredLoad {
    target: Value,
    property: String,
    key: CacheKey,
    target_type: TargetType,
}

impl DeferredLoad {
    pub fn new(
        target: Value,
        property: impl Into<String>,
        key: CacheKey,
        target_type: TargetType,
    ) -> Self {
        DeferredLoad {
            target,
            property: property.into(),
            key,
            target_type,
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Whether the source result is available
    pub fn can_load(&self, cache: &LocalCache) -> bool {
        cache.resolved(&self.key).is_some()
    }

    /// Extract the cached result and assign it to the target property
    pub fn load(&self, cache: &LocalCache, accessor: &dyn PropertyAccessor) -> ExecutorResult<()> {
        let rows = cache
            .resolved(&self.key)
            .ok_or_else(|| ExecutorError::UnresolvedDeferredLoad {
                property: self.property.clone(),
                key: self.key.to_string(),
            })?;
        let value = ResultExtractor::extract(rows, self.target_type)?;
        accessor.set(&self.target, &self.property, value)
    }
}

/// FIFO queue of deferred loads owned by one executor
#[derive(Debug, Default)]
pub struct DeferredLoadQueue {
    pending: VecDeque<DeferredLoad>,
}

impl DeferredLoadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff the store holds a resolved result for `key`
    pub fn can_load_now(key: &CacheKey, cache: &LocalCache) -> bool {
        cache.resolved(key).is_some()
    }

    pub fn enqueue(&mut self, task: DeferredLoad) {
        self.pending.push_back(task);
    }

    /// Load `task` immediately when its source is resolved, otherwise queue it
    pub fn defer(
        &mut self,
        task: DeferredLoad,
        cache: &LocalCache,
        accessor: &dyn PropertyAccessor,
    ) -> ExecutorResult<()> {
        if task.can_load(cache) {
            task.load(cache, accessor)
        } else {
            tracing::debug!(property = %task.property, key = %task.key, "deferred_load_queued");
            self.enqueue(task);
            Ok(())
        }
    }

    /// Run every queued task in order and empty the queue.
    ///
    /// Every task is attempted; the first failure is returned.
    pub fn drain_all(&mut self, cache: &LocalCache, accessor: &dyn PropertyAccessor) -> ExecutorResult<()> {
        let mut first_error = None;
        let mut loaded = 0usize;
        while let Some(task) = self.pending.pop_front() {
            match task.load(cache, accessor) {
                Ok(()) => loaded += 1,
                Err(e) => {
                    tracing::warn!(property = %task.property, error = %e, "deferred_load_failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        if loaded > 0 {
            tracing::debug!(loaded, "deferred_loads_drained");
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Drop every queued task, returning how many were dropped
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
