//! # Value Type System
//!
//! Dynamically typed values flowing through the executor: statement
//! parameters, cache-key parts, and mapped result rows.
//!
//! ## Design Decisions
//!
//! - **Scalars are immutable**: integers, floats, strings, booleans, timestamps
//! - **Objects are shared**: `Value::Object` wraps an [`ObjectRef`], a
//!   reference-counted, interior-mutable record. Cloning an object value clones
//!   the handle, so output parameters and deferred association loads can
//!   populate a caller's object in place.
//! - **Result collections are shared**: [`Rows`] is an `Arc<Vec<Value>>`, so a
//!   cache hit hands back the very collection that was stored.
//!
//! ## Usage
//!
//! ```rust
//! use sqlsession::value::{ObjectRef, Value};
//!
//! let user = ObjectRef::from_fields([("id", Value::from(7)), ("name", Value::from("Ann"))]);
//! let param = Value::Object(user.clone());
//!
//! user.set("name", Value::from("Bea"));
//! assert_eq!(param.field("name"), Some(Value::from("Bea")));
//! ```

use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Result collection returned by queries and stored in caches
pub type Rows = Arc<Vec<Value>>;

/// Data types known to the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    Null,
    Bool,
    Int32,
    Int64,
    Float64,
    String,
    Timestamp,
    List,
    Object,
}

impl DataType {
    /// Whether values of this type are single column values
    pub fn is_scalar(&self) -> bool {
        !matches!(self, DataType::List | DataType::Object)
    }

    /// Check if a value matches this type
    pub fn matches(&self, value: &Value) -> bool {
        value.data_type() == *self
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Null => "null",
            DataType::Bool => "bool",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float64 => "float64",
            DataType::String => "string",
            DataType::Timestamp => "timestamp",
            DataType::List => "list",
            DataType::Object => "object",
        };
        f.write_str(name)
    }
}

/// A dynamically-typed value
#[derive(Debug, Clone)]
pub enum Value {
    /// Null/missing value
    Null,
    /// Boolean value
    Bool(bool),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit floating point
    Float64(f64),
    /// UTF-8 string (reference counted for efficient cloning)
    String(Arc<str>),
    /// Unix timestamp in milliseconds since epoch
    Timestamp(i64),
    /// Ordered collection (collection-valued properties)
    List(Arc<Vec<Value>>),
    /// Shared structured value
    Object(ObjectRef),
}

impl Value {
    /// Get the data type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Bool(_) => DataType::Bool,
            Value::Int32(_) => DataType::Int32,
            Value::Int64(_) => DataType::Int64,
            Value::Float64(_) => DataType::Float64,
            Value::String(_) => DataType::String,
            Value::Timestamp(_) => DataType::Timestamp,
            Value::List(_) => DataType::List,
            Value::Object(_) => DataType::Object,
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) | Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            Value::Int32(v) => Some(f64::from(*v)),
            Value::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to get as string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as list slice
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Try to get the object handle
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Read a top-level field of an object value
    pub fn field(&self, name: &str) -> Option<Value> {
        self.as_object().and_then(|obj| obj.get(name))
    }

    /// Create a string value from a &str
    pub fn string(s: &str) -> Self {
        Value::String(Arc::from(s))
    }

    /// Create a list value
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    /// Create an object value from `(name, value)` pairs
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(ObjectRef::from_fields(fields))
    }

    /// Create a timestamp value from milliseconds since Unix epoch
    pub fn timestamp(ms: i64) -> Self {
        Value::Timestamp(ms)
    }

    /// Deep copy: objects are copied into fresh handles instead of shared
    pub fn detached(&self) -> Value {
        match self {
            Value::Object(obj) => Value::Object(obj.detached()),
            Value::List(items) => Value::list(items.iter().map(Value::detached).collect()),
            other => other.clone(),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int32(_) => 2,
            Value::Int64(_) => 3,
            Value::Float64(_) => 4,
            Value::Timestamp(_) => 5,
            Value::String(_) => 6,
            Value::List(_) => 7,
            Value::Object(_) => 8,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Timestamp(ts) => write!(f, "{ts}ms"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Object(obj) => write!(f, "{obj}"),
        }
    }
}

// Implement PartialEq manually to handle f64 comparison
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

// Implement Hash manually to handle f64 and objects
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int32(v) => v.hash(state),
            Value::Int64(v) | Value::Timestamp(v) => v.hash(state),
            Value::Float64(v) => v.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::List(items) => {
                items.len().hash(state);
                for item in items.iter() {
                    item.hash(state);
                }
            }
            Value::Object(obj) => obj.hash(state),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int32(a), Value::Int32(b)) => a.cmp(b),
            (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            (Value::Float64(a), Value::Float64(b)) => a.total_cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.iter().cmp(b.iter()),
            (Value::Object(a), Value::Object(b)) => a.snapshot().cmp(&b.snapshot()),
            // Cross-type ordering: Null < Bool < Int32 < Int64 < Float64 < Timestamp < String < List < Object
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

// Convenience conversions
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int64(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s.as_str()))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Shared handle to a structured value (field name → value).
///
/// Equality and hashing compare contents. Locks are held only for the
/// duration of a single field read or write.
#[derive(Clone, Default)]
pub struct ObjectRef(Arc<RwLock<BTreeMap<String, Value>>>);

impl ObjectRef {
    /// Create an empty object
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object from `(name, value)` pairs
    pub fn from_fields<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let map = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        ObjectRef(Arc::new(RwLock::new(map)))
    }

    /// Read a field
    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.read().get(name).cloned()
    }

    /// Write a field, returning the previous value
    pub fn set(&self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.0.write().insert(name.into(), value)
    }

    /// Whether the field exists
    pub fn contains(&self, name: &str) -> bool {
        self.0.read().contains_key(name)
    }

    /// Field names in order
    pub fn field_names(&self) -> Vec<String> {
        self.0.read().keys().cloned().collect()
    }

    /// Copy of the current fields
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.0.read().clone()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Whether the object has no fields
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// True if both handles point at the same object
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Deep copy into a new, unshared handle
    pub fn detached(&self) -> ObjectRef {
        let copy = self
            .snapshot()
            .into_iter()
            .map(|(k, v)| (k, v.detached()));
        ObjectRef::from_fields(copy)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.snapshot() == other.snapshot()
    }
}

impl Eq for ObjectRef {}

impl Hash for ObjectRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let fields = self.snapshot();
        fields.len().hash(state);
        for (name, value) in &fields {
            name.hash(state);
            value.hash(state);
        }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.snapshot()).finish()
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.snapshot().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(value: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_float_equality_uses_bits() {
        assert_eq!(Value::Float64(1.5), Value::Float64(1.5));
        assert_ne!(Value::Float64(0.0), Value::Float64(-0.0));
        assert_eq!(hash_of(&Value::Float64(f64::NAN)), hash_of(&Value::Float64(f64::NAN)));
    }

    #[test]
    fn test_cross_type_values_differ() {
        assert_ne!(Value::Int32(1), Value::Int64(1));
        assert_ne!(Value::Null, Value::Int32(0));
        assert!(Value::Null < Value::Bool(false));
        assert!(Value::Int32(100) < Value::string("a"));
    }

    #[test]
    fn test_object_shared_mutation() {
        let obj = ObjectRef::new();
        let value = Value::Object(obj.clone());
        obj.set("id", Value::from(7));
        assert_eq!(value.field("id"), Some(Value::Int32(7)));
        assert_eq!(value.field("missing"), None);
    }

    #[test]
    fn test_object_equality_by_contents() {
        let a = Value::object([("id", Value::from(1)), ("name", Value::from("x"))]);
        let b = Value::object([("name", Value::from("x")), ("id", Value::from(1))]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let c = Value::object([("id", Value::from(2))]);
        assert_ne!(a, c);
    }

    #[test]
    fn test_detached_copy_is_independent() {
        let inner = ObjectRef::from_fields([("city", Value::from("Oslo"))]);
        let outer = Value::object([("address", Value::Object(inner.clone()))]);
        let copy = outer.detached();

        inner.set("city", Value::from("Bergen"));

        let copied_city = copy.field("address").and_then(|a| a.field("city"));
        assert_eq!(copied_city, Some(Value::from("Oslo")));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::from("a").to_string(), "\"a\"");
        assert_eq!(Value::list(vec![Value::from(1), Value::from(2)]).to_string(), "[1, 2]");
        let obj = Value::object([("id", Value::from(7))]);
        assert_eq!(obj.to_string(), "{id: 7}");
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::from("x"));
    }

    #[test]
    fn test_data_type_scalar() {
        assert!(DataType::Int64.is_scalar());
        assert!(!DataType::Object.is_scalar());
        assert!(DataType::String.matches(&Value::from("s")));
    }
}
