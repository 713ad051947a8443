//! Shared Result Cache
//!
//! Second-level cache shared by every session of a statement namespace.
//!
//! ## Eviction
//!
//! Bounded by `max_entries`. When a new key arrives at capacity, entries past
//! their TTL go first; if none have expired, the least recently used entry is
//! dropped. Recency is a logical clock bumped on every read and write, so
//! ordering does not depend on timer resolution.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::CacheKey;
use crate::config::SharedCacheConfig;
use crate::value::Rows;

/// Hit, miss and eviction counters of one shared cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped to make room
    pub evictions: u64,
    /// Entries dropped because their TTL passed
    pub expirations: u64,
}

impl CacheStats {
    /// Fraction of lookups answered from the cache (0.0 when none were made)
    pub fn hit_rate(&self) -> f64 {
        match self.hits + self.misses {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }
}

struct Slot {
    rows: Rows,
    expires_at: Option<Instant>,
    last_used: u64,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

#[derive(Default)]
struct Inner {
    slots: HashMap<CacheKey, Slot>,
    clock: u64,
    stats: CacheStats,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn make_room(&mut self) {
        let now = Instant::now();
        let before = self.slots.len();
        self.slots.retain(|_, slot| !slot.is_expired(now));
        let expired = before - self.slots.len();
        if expired > 0 {
            self.stats.expirations += expired as u64;
            return;
        }

        let oldest = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.slots.remove(&key);
            self.stats.evictions += 1;
        }
    }
}

/// Thread-safe LRU result cache with optional TTL, identified by namespace
pub struct SharedCache {
    id: String,
    max_entries: usize,
    ttl: Option<Duration>,
    inner: Mutex<Inner>,
}

impl SharedCache {
    pub fn new(id: impl Into<String>, max_entries: usize, ttl: Option<Duration>) -> Self {
        SharedCache {
            id: id.into(),
            max_entries: max_entries.max(1),
            ttl,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Cache sized by the `[cache]` settings
    pub fn from_config(id: impl Into<String>, config: &SharedCacheConfig) -> Self {
        SharedCache::new(id, config.max_entries, config.ttl())
    }

    /// Namespace this cache serves
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, key: &CacheKey) -> Option<Rows> {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        match inner.slots.get(key).map(|slot| slot.is_expired(now)) {
            None => {
                inner.stats.misses += 1;
                return None;
            }
            Some(true) => {
                inner.slots.remove(key);
                inner.stats.misses += 1;
                inner.stats.expirations += 1;
                return None;
            }
            Some(false) => {}
        }

        let tick = inner.tick();
        inner.stats.hits += 1;
        inner.slots.get_mut(key).map(|slot| {
            slot.last_used = tick;
            Rows::clone(&slot.rows)
        })
    }

    pub fn put(&self, key: CacheKey, rows: Rows) {
        let mut inner = self.inner.lock();
        if !inner.slots.contains_key(&key) && inner.slots.len() >= self.max_entries {
            inner.make_room();
        }
        let last_used = inner.tick();
        let expires_at = self.ttl.map(|ttl| Instant::now() + ttl);
        inner.slots.insert(
            key,
            Slot {
                rows,
                expires_at,
                last_used,
            },
        );
    }

    pub fn remove(&self, key: &CacheKey) -> Option<Rows> {
        self.inner.lock().slots.remove(key).map(|slot| slot.rows)
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    pub fn reset_stats(&self) {
        self.inner.lock().stats = CacheStats::default();
    }

    pub fn clear(&self) {
        self.inner.lock().slots.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SharedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCache")
            .field("id", &self.id)
            .field("max_entries", &self.max_entries)
            .field("ttl", &self.ttl)
            .field("len", &self.len())
            .finish()
    }
}
