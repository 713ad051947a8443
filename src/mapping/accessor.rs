//! Property access on structured values.
//!
//! Paths are dot separated (`address.city`). Reading a missing field, or
//! walking through a non-object, yields `Null`. Writing creates intermediate
//! objects as needed and fails when the root is not an object.

use crate::error::{ExecutorError, ExecutorResult};
use crate::value::{ObjectRef, Value};

/// Capability to read and write named properties of a value
pub trait PropertyAccessor: Send + Sync {
    /// Read the property at `path`; `Null` when absent
    fn get(&self, object: &Value, path: &str) -> Value;

    /// Write the property at `path`
    fn set(&self, object: &Value, path: &str, value: Value) -> ExecutorResult<()>;
}

/// Default accessor over [`Value::Object`] with dotted paths
#[derive(Debug, Clone, Copy, Default)]
pub struct PathAccessor;

impl PropertyAccessor for PathAccessor {
    fn get(&self, object: &Value, path: &str) -> Value {
        let mut current = object.clone();
        for segment in path.split('.') {
            current = match current.field(segment) {
                Some(next) => next,
                None => return Value::Null,
            };
        }
        current
    }

    fn set(&self, object: &Value, path: &str, value: Value) -> ExecutorResult<()> {
        let Some(root) = object.as_object() else {
            return Err(ExecutorError::Property {
                path: path.to_string(),
                reason: format!("target is a {} value, not an object", object.data_type()),
            });
        };

        let (parents, leaf) = match path.rsplit_once('.') {
            Some((parents, leaf)) => (Some(parents), leaf),
            None => (None, path),
        };

        let mut target = root.clone();
        for segment in parents.into_iter().flat_map(|p| p.split('.')) {
            target = match target.get(segment) {
                Some(Value::Object(next)) => next,
                Some(Value::Null) | None => {
                    let created = ObjectRef::new();
                    target.set(segment, Value::Object(created.clone()));
                    created
                }
                Some(other) => {
                    return Err(ExecutorError::Property {
                        path: path.to_string(),
                        reason: format!("'{segment}' holds a {} value", other.data_type()),
                    })
                }
            };
        }

        target.set(leaf, value);
        Ok(())
    }
}
