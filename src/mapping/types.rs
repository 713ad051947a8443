//! Registry of types that bind directly as a single parameter value.

use std::collections::BTreeSet;

use crate::value::{DataType, Value};

/// Types with a registered scalar conversion.
///
/// A parameter object whose type is registered is bound as-is for every
/// parameter mapping; anything else is treated as a structured value and read
/// property by property.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    handled: BTreeSet<DataType>,
}

impl TypeRegistry {
    /// Registry with no handlers
    pub fn empty() -> Self {
        TypeRegistry {
            handled: BTreeSet::new(),
        }
    }

    pub fn register(&mut self, data_type: DataType) {
        self.handled.insert(data_type);
    }

    pub fn unregister(&mut self, data_type: DataType) {
        self.handled.remove(&data_type);
    }

    pub fn has_handler_for(&self, data_type: DataType) -> bool {
        self.handled.contains(&data_type)
    }

    /// Whether `value` binds directly as a single parameter
    pub fn has_handler(&self, value: &Value) -> bool {
        self.has_handler_for(value.data_type())
    }
}

impl Default for TypeRegistry {
    /// Every scalar type is registered
    fn default() -> Self {
        let mut registry = TypeRegistry::empty();
        for data_type in [
            DataType::Bool,
            DataType::Int32,
            DataType::Int64,
            DataType::Float64,
            DataType::String,
            DataType::Timestamp,
        ] {
            registry.register(data_type);
        }
        registry
    }
}
