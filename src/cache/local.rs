//! Local result store owned by a single executor.

use std::collections::HashMap;

use super::CacheKey;
use crate::value::{Rows, Value};

/// Captured output parameters of a procedure call, by property path
pub type OutputSnapshot = Vec<(String, Value)>;

/// State of a local cache entry
#[derive(Debug, Clone)]
pub enum CacheSlot {
    /// A query for this key is executing further up the call stack
    InFlight,
    /// Completed result collection
    Resolved(Rows),
}

/// Per-executor result store.
///
/// Holds query results (or in-flight placeholders) and, for procedure calls,
/// snapshots of their output parameters. Both maps are cleared together.
/// Not synchronized: one executor, one caller.
#[derive(Debug, Default)]
pub struct LocalCache {
    results: HashMap<CacheKey, CacheSlot>,
    outputs: HashMap<CacheKey, OutputSnapshot>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<&CacheSlot> {
        self.results.get(key)
    }

    /// Completed result for `key`, ignoring placeholders
    pub fn resolved(&self, key: &CacheKey) -> Option<&Rows> {
        match self.results.get(key) {
            Some(CacheSlot::Resolved(rows)) => Some(rows),
            _ => None,
        }
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        matches!(self.results.get(key), Some(CacheSlot::InFlight))
    }

    /// Mark `key` as executing
    pub fn reserve(&mut self, key: CacheKey) {
        self.results.insert(key, CacheSlot::InFlight);
    }

    pub fn put(&mut self, key: CacheKey, rows: Rows) {
        self.results.insert(key, CacheSlot::Resolved(rows));
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<CacheSlot> {
        self.results.remove(key)
    }

    pub fn put_outputs(&mut self, key: CacheKey, snapshot: OutputSnapshot) {
        self.outputs.insert(key, snapshot);
    }

    pub fn outputs(&self, key: &CacheKey) -> Option<&OutputSnapshot> {
        self.outputs.get(key)
    }

    /// Empty both the result and the output-parameter maps
    pub fn clear(&mut self) {
        self.results.clear();
        self.outputs.clear();
    }

    /// Number of result entries, placeholders included
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn key(n: i32) -> CacheKey {
        let mut key = CacheKey::new();
        key.update(n);
        key
    }

    #[test]
    fn test_placeholder_is_not_resolved() {
        let mut cache = LocalCache::new();
        cache.reserve(key(1));

        assert!(cache.is_in_flight(&key(1)));
        assert!(cache.resolved(&key(1)).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_remove_then_put_replaces_placeholder() {
        let mut cache = LocalCache::new();
        cache.reserve(key(1));
        cache.remove(&key(1));
        let rows: Rows = Arc::new(vec![Value::from(1)]);
        cache.put(key(1), Arc::clone(&rows));

        assert!(!cache.is_in_flight(&key(1)));
        assert!(Arc::ptr_eq(cache.resolved(&key(1)).unwrap(), &rows));
    }

    #[test]
    fn test_clear_empties_outputs_too() {
        let mut cache = LocalCache::new();
        cache.put(key(1), Arc::new(vec![]));
        cache.put_outputs(key(1), vec![("total".to_string(), Value::from(3))]);

        cache.clear();

        assert!(cache.is_empty());
        assert!(cache.outputs(&key(1)).is_none());
    }
}
