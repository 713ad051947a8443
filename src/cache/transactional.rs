//! Transaction-aware staging in front of shared caches.
//!
//! Results read inside a unit of work are staged and only published to the
//! shared cache on commit, so other sessions never observe uncommitted data.
//! A clear requested inside the unit of work hides the shared entries for the
//! rest of it and is applied on commit.

use std::collections::HashMap;
use std::sync::Arc;

use super::{CacheKey, SharedCache};
use crate::value::Rows;

/// Staging area for one shared cache within one unit of work
#[derive(Debug)]
pub struct TransactionalCache {
    delegate: Arc<SharedCache>,
    clear_on_commit: bool,
    entries_to_add_on_commit: HashMap<CacheKey, Rows>,
}

impl TransactionalCache {
    pub fn new(delegate: Arc<SharedCache>) -> Self {
        TransactionalCache {
            delegate,
            clear_on_commit: false,
            entries_to_add_on_commit: HashMap::new(),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Rows> {
        if self.clear_on_commit {
            return None;
        }
        self.delegate.get(key)
    }

    /// Stage an entry for publication on commit
    pub fn put(&mut self, key: CacheKey, rows: Rows) {
        self.entries_to_add_on_commit.insert(key, rows);
    }

    /// Hide shared entries now, clear them on commit
    pub fn clear(&mut self) {
        self.clear_on_commit = true;
        self.entries_to_add_on_commit.clear();
    }

    pub fn commit(&mut self) {
        if self.clear_on_commit {
            self.delegate.clear();
        }
        for (key, rows) in self.entries_to_add_on_commit.drain() {
            self.delegate.put(key, rows);
        }
        self.reset();
    }

    pub fn rollback(&mut self) {
        self.reset();
    }

    /// Number of staged entries
    pub fn pending(&self) -> usize {
        self.entries_to_add_on_commit.len()
    }

    fn reset(&mut self) {
        self.clear_on_commit = false;
        self.entries_to_add_on_commit.clear();
    }
}

/// One [`TransactionalCache`] per shared cache touched by a unit of work
#[derive(Debug, Default)]
pub struct TransactionalCacheManager {
    caches: HashMap<String, TransactionalCache>,
}

impl TransactionalCacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self, cache: &Arc<SharedCache>) {
        self.staging(cache).clear();
    }

    pub fn get(&mut self, cache: &Arc<SharedCache>, key: &CacheKey) -> Option<Rows> {
        self.staging(cache).get(key)
    }

    pub fn put(&mut self, cache: &Arc<SharedCache>, key: CacheKey, rows: Rows) {
        self.staging(cache).put(key, rows);
    }

    pub fn commit(&mut self) {
        for staging in self.caches.values_mut() {
            staging.commit();
        }
    }

    pub fn rollback(&mut self) {
        for staging in self.caches.values_mut() {
            staging.rollback();
        }
    }

    fn staging(&mut self, cache: &Arc<SharedCache>) -> &mut TransactionalCache {
        self.caches
            .entry(cache.id().to_string())
            .or_insert_with(|| TransactionalCache::new(Arc::clone(cache)))
    }
}
