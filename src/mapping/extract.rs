//! Turns a cached result collection into a property value.

use std::sync::Arc;

use crate::error::{ExecutorError, ExecutorResult};
use crate::value::{Rows, Value};

/// Shape of the property being populated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetType {
    /// Single value: zero rows → `Null`, one row → that row, more → error
    #[default]
    Object,
    /// Collection: the whole result as a list
    List,
}

/// Extracts property values from result collections
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultExtractor;

impl ResultExtractor {
    pub fn extract(rows: &Rows, target: TargetType) -> ExecutorResult<Value> {
        match target {
            TargetType::List => Ok(Value::List(Arc::clone(rows))),
            TargetType::Object => match rows.len() {
                0 => Ok(Value::Null),
                1 => Ok(rows[0].clone()),
                count => Err(ExecutorError::TooManyRows { count }),
            },
        }
    }
}
