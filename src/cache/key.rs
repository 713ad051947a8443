//! Composite cache keys.
//!
//! A key is an append-only, order-sensitive fold of values. Alongside the
//! parts it keeps a running hash, checksum and count so unequal keys are
//! usually rejected without comparing parts.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::mapping::{BoundStatement, MappedStatement, RowBounds};
use crate::session::Configuration;
use crate::value::Value;

const DEFAULT_MULTIPLIER: u64 = 37;
const DEFAULT_HASHCODE: u64 = 17;

/// Order-sensitive fingerprint of one logical invocation
#[derive(Clone)]
pub struct CacheKey {
    hashcode: u64,
    checksum: u64,
    count: usize,
    parts: Vec<Value>,
}

impl CacheKey {
    pub fn new() -> Self {
        CacheKey {
            hashcode: DEFAULT_HASHCODE,
            checksum: 0,
            count: 0,
            parts: Vec::new(),
        }
    }

    /// Fold one more value into the key
    pub fn update(&mut self, value: impl Into<Value>) {
        let value = value.into();
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        let mut base = hasher.finish();

        self.count += 1;
        self.checksum = self.checksum.wrapping_add(base);
        base = base.wrapping_mul(self.count as u64);
        self.hashcode = DEFAULT_MULTIPLIER
            .wrapping_mul(self.hashcode)
            .wrapping_add(base);

        self.parts.push(value);
    }

    /// Fold several values in order
    pub fn update_all<I, V>(&mut self, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        for value in values {
            self.update(value);
        }
    }

    /// Number of folded values
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn parts(&self) -> &[Value] {
        &self.parts
    }
}

impl Default for CacheKey {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hashcode == other.hashcode
            && self.checksum == other.checksum
            && self.count == other.count
            && self.parts == other.parts
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hashcode);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hashcode, self.checksum)?;
        for part in &self.parts {
            write!(f, ":{part}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({self})")
    }
}

/// Build the cache key for one invocation.
///
/// Folds, in order: statement id, offset, limit, SQL text, the resolved value
/// of every non-output parameter, and the environment id when one is
/// configured.
pub fn build_cache_key(
    configuration: &Configuration,
    statement: &MappedStatement,
    parameter: &Value,
    bounds: RowBounds,
    bound: &BoundStatement,
) -> CacheKey {
    let mut key = CacheKey::new();
    key.update(statement.id());
    key.update(bounds.offset);
    key.update(bounds.limit);
    key.update(bound.sql());

    for mapping in bound.parameter_mappings() {
        if mapping.mode.is_input() {
            key.update(configuration.parameter_value(bound, parameter, &mapping.property));
        }
    }

    if let Some(environment) = configuration.environment_id() {
        key.update(environment);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_of(values: &[Value]) -> CacheKey {
        let mut key = CacheKey::new();
        key.update_all(values.iter().cloned());
        key
    }

    #[test]
    fn test_equal_folds_are_equal() {
        let a = key_of(&[Value::from("find"), Value::from(0usize), Value::from(7)]);
        let b = key_of(&[Value::from("find"), Value::from(0usize), Value::from(7)]);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_order_matters() {
        let a = key_of(&[Value::from(1), Value::from(2)]);
        let b = key_of(&[Value::from(2), Value::from(1)]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_null_and_absent_differ() {
        let a = key_of(&[Value::from("find")]);
        let b = key_of(&[Value::from("find"), Value::Null]);
        assert_ne!(a, b);
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn test_display_lists_parts() {
        let key = key_of(&[Value::from("find"), Value::from(7)]);
        assert!(key.to_string().ends_with(":\"find\":7"));
    }

    #[test]
    fn test_usable_as_map_key() {
        let mut map = std::collections::HashMap::new();
        map.insert(key_of(&[Value::from(1)]), "one");
        assert_eq!(map.get(&key_of(&[Value::from(1)])), Some(&"one"));
        assert_eq!(map.get(&key_of(&[Value::from(2)])), None);
    }
}
