//! Statement Descriptors
//!
//! Immutable definitions of named, parametrized statements and the per-call
//! artifacts derived from them.
//!
//! ## Architecture
//!
//! ```text
//! MappedStatement (id, command, cache flags, scope, timeout)
//! ├── SqlSource          parameter object → BoundStatement
//! ├── ResultMapping      raw row → mapped row
//! │   ├── Rows             RowTransform, row-local (also used by cursors)
//! │   └── Nested           RowMapper, may run nested queries
//! └── SharedCache        optional second-level cache
//!
//! BoundStatement (one invocation)
//! ├── sql                final parametrized SQL text
//! ├── parameter_mappings ordered (property, type, mode)
//! └── additional         synthetic bindings (loop variables, etc.)
//! ```

pub mod accessor;
pub mod extract;
pub mod types;

pub use accessor::{PathAccessor, PropertyAccessor};
pub use extract::{ResultExtractor, TargetType};
pub use types::TypeRegistry;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::SharedCache;
use crate::config::CacheScope;
use crate::error::ExecutorResult;
use crate::executor::Executor;
use crate::value::{DataType, Value};

/// What a statement does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Returns rows
    Read,
    /// Insert, update or delete; returns an affected-row count
    Write,
    /// Stored procedure call; may return rows and output parameters
    ProcedureCall,
}

/// Direction of a statement parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParameterMode {
    #[default]
    In,
    Out,
    InOut,
}

impl ParameterMode {
    /// Whether the parameter carries a value into the statement
    pub fn is_input(self) -> bool {
        self != ParameterMode::Out
    }

    /// Whether the statement writes the parameter back
    pub fn is_output(self) -> bool {
        self != ParameterMode::In
    }
}

/// One positional parameter of a bound statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterMapping {
    /// Property path on the parameter object (or additional parameter name)
    pub property: String,
    /// Expected type, if declared
    pub data_type: Option<DataType>,
    pub mode: ParameterMode,
}

impl ParameterMapping {
    /// Input parameter with no declared type
    pub fn new(property: impl Into<String>) -> Self {
        ParameterMapping {
            property: property.into(),
            data_type: None,
            mode: ParameterMode::In,
        }
    }

    pub fn with_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn with_mode(mut self, mode: ParameterMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Fully resolved SQL for one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    sql: String,
    parameter_mappings: Vec<ParameterMapping>,
    additional: BTreeMap<String, Value>,
}

impl BoundStatement {
    pub fn new(sql: impl Into<String>, parameter_mappings: Vec<ParameterMapping>) -> Self {
        BoundStatement {
            sql: sql.into(),
            parameter_mappings,
            additional: BTreeMap::new(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameter_mappings(&self) -> &[ParameterMapping] {
        &self.parameter_mappings
    }

    /// Bind a synthetic parameter
    pub fn set_additional_parameter(&mut self, name: impl Into<String>, value: Value) {
        self.additional.insert(name.into(), value);
    }

    /// Builder form of [`BoundStatement::set_additional_parameter`]
    pub fn with_additional_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set_additional_parameter(name, value);
        self
    }

    /// Whether `property` (or the root of a dotted path) is an additional parameter
    pub fn has_additional_parameter(&self, property: &str) -> bool {
        self.additional.contains_key(root_segment(property))
    }

    /// Resolve `property` against the additional parameters.
    ///
    /// `item.id` resolves `id` on the additional parameter `item`.
    pub fn additional_parameter(&self, property: &str, accessor: &dyn PropertyAccessor) -> Value {
        let root = root_segment(property);
        let Some(value) = self.additional.get(root) else {
            return Value::Null;
        };
        match property.split_once('.') {
            Some((_, rest)) => accessor.get(value, rest),
            None => value.clone(),
        }
    }
}

fn root_segment(property: &str) -> &str {
    property.split('.').next().unwrap_or(property)
}

/// Pagination bounds applied to a read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowBounds {
    pub offset: usize,
    pub limit: usize,
}

impl RowBounds {
    /// Limit value meaning "no limit"
    pub const NO_ROW_LIMIT: usize = i32::MAX as usize;

    pub const DEFAULT: RowBounds = RowBounds {
        offset: 0,
        limit: Self::NO_ROW_LIMIT,
    };

    pub fn new(offset: usize, limit: usize) -> Self {
        RowBounds { offset, limit }
    }

    /// Whether any paging is in effect
    pub fn is_bounded(&self) -> bool {
        self.offset > 0 || self.limit < Self::NO_ROW_LIMIT
    }
}

impl Default for RowBounds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Produces the bound statement for a parameter object
pub trait SqlSource: Send + Sync {
    fn bound_statement(&self, parameter: &Value) -> BoundStatement;
}

impl<F> SqlSource for F
where
    F: Fn(&Value) -> BoundStatement + Send + Sync,
{
    fn bound_statement(&self, parameter: &Value) -> BoundStatement {
        self(parameter)
    }
}

/// SQL text whose parameter list does not depend on the parameter object
#[derive(Debug, Clone)]
pub struct StaticSqlSource {
    sql: String,
    parameter_mappings: Vec<ParameterMapping>,
}

impl StaticSqlSource {
    pub fn new(sql: impl Into<String>, parameter_mappings: Vec<ParameterMapping>) -> Self {
        StaticSqlSource {
            sql: sql.into(),
            parameter_mappings,
        }
    }
}

impl SqlSource for StaticSqlSource {
    fn bound_statement(&self, _parameter: &Value) -> BoundStatement {
        BoundStatement::new(self.sql.clone(), self.parameter_mappings.clone())
    }
}

/// Maps one raw row into its result value.
///
/// Receives the executor so association properties can run nested queries or
/// register deferred loads.
pub trait RowMapper: Send + Sync {
    fn map_row(
        &self,
        executor: &mut Executor,
        statement: &MappedStatement,
        row: Value,
    ) -> ExecutorResult<Value>;
}

impl<F> RowMapper for F
where
    F: Fn(&mut Executor, &MappedStatement, Value) -> ExecutorResult<Value> + Send + Sync,
{
    fn map_row(
        &self,
        executor: &mut Executor,
        statement: &MappedStatement,
        row: Value,
    ) -> ExecutorResult<Value> {
        self(executor, statement, row)
    }
}

/// Maps one raw row using only the row itself
pub trait RowTransform: Send + Sync {
    fn transform(&self, row: Value) -> ExecutorResult<Value>;
}

impl<F> RowTransform for F
where
    F: Fn(Value) -> ExecutorResult<Value> + Send + Sync,
{
    fn transform(&self, row: Value) -> ExecutorResult<Value> {
        self(row)
    }
}

/// How a statement turns raw rows into results
#[derive(Clone)]
pub enum ResultMapping {
    /// Row-local mapping; usable wherever rows are produced, cursors included
    Rows(Arc<dyn RowTransform>),
    /// Mapping that needs the executor for nested queries or deferred loads
    Nested(Arc<dyn RowMapper>),
}

impl ResultMapping {
    pub fn map_row(
        &self,
        executor: &mut Executor,
        statement: &MappedStatement,
        row: Value,
    ) -> ExecutorResult<Value> {
        match self {
            ResultMapping::Rows(transform) => transform.transform(row),
            ResultMapping::Nested(mapper) => mapper.map_row(executor, statement, row),
        }
    }

    /// The executor-free half, if this mapping has one
    pub fn row_transform(&self) -> Option<&Arc<dyn RowTransform>> {
        match self {
            ResultMapping::Rows(transform) => Some(transform),
            ResultMapping::Nested(_) => None,
        }
    }
}

impl fmt::Debug for ResultMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultMapping::Rows(_) => f.write_str("Rows"),
            ResultMapping::Nested(_) => f.write_str("Nested"),
        }
    }
}

/// Immutable definition of a named statement
pub struct MappedStatement {
    id: String,
    command: CommandKind,
    sql_source: Arc<dyn SqlSource>,
    use_cache: bool,
    flush_cache_required: bool,
    cache_scope: Option<CacheScope>,
    timeout: Option<Duration>,
    result_mapping: Option<ResultMapping>,
    cache: Option<Arc<SharedCache>>,
}

impl MappedStatement {
    /// Start building a statement.
    ///
    /// Reads default to `use_cache = true, flush_cache = false`; writes and
    /// procedure calls default to `use_cache = false, flush_cache = true`.
    ///
    /// The cache scope stays unset unless chosen here. Registering the
    /// statement with `Configuration::add_statement` fills it from
    /// `[session] local_cache_scope`; a statement used unregistered runs with
    /// `UnitOfWork`.
    pub fn builder(
        id: impl Into<String>,
        command: CommandKind,
        sql_source: impl SqlSource + 'static,
    ) -> MappedStatementBuilder {
        let is_read = command == CommandKind::Read;
        MappedStatementBuilder {
            statement: MappedStatement {
                id: id.into(),
                command,
                sql_source: Arc::new(sql_source),
                use_cache: is_read,
                flush_cache_required: !is_read,
                cache_scope: None,
                timeout: None,
                result_mapping: None,
                cache: None,
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn command(&self) -> CommandKind {
        self.command
    }

    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    pub fn flush_cache_required(&self) -> bool {
        self.flush_cache_required
    }

    /// Local cache scope; statements that never had one set use `UnitOfWork`
    pub fn cache_scope(&self) -> CacheScope {
        self.cache_scope.unwrap_or_default()
    }

    /// Adopt `scope` unless one was chosen explicitly
    pub(crate) fn inherit_cache_scope(&mut self, scope: CacheScope) {
        self.cache_scope.get_or_insert(scope);
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn result_mapping(&self) -> Option<&ResultMapping> {
        self.result_mapping.as_ref()
    }

    /// Shared (second-level) cache for this statement's namespace
    pub fn cache(&self) -> Option<&Arc<SharedCache>> {
        self.cache.as_ref()
    }

    /// Resolve the SQL and parameter list for one invocation
    pub fn bound_statement(&self, parameter: &Value) -> BoundStatement {
        self.sql_source.bound_statement(parameter)
    }
}

impl fmt::Debug for MappedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedStatement")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("use_cache", &self.use_cache)
            .field("flush_cache_required", &self.flush_cache_required)
            .field("cache_scope", &self.cache_scope())
            .field("timeout", &self.timeout)
            .field("result_mapping", &self.result_mapping)
            .field("cache", &self.cache.as_ref().map(|c| c.id().to_string()))
            .finish()
    }
}

/// Builder for [`MappedStatement`]
pub struct MappedStatementBuilder {
    statement: MappedStatement,
}

impl MappedStatementBuilder {
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.statement.use_cache = use_cache;
        self
    }

    pub fn flush_cache(mut self, flush: bool) -> Self {
        self.statement.flush_cache_required = flush;
        self
    }

    pub fn cache_scope(mut self, scope: CacheScope) -> Self {
        self.statement.cache_scope = Some(scope);
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.statement.timeout = timeout;
        self
    }

    /// Map rows with access to the executor. Such statements cannot be
    /// opened as cursors.
    pub fn result_mapper(mut self, mapper: impl RowMapper + 'static) -> Self {
        self.statement.result_mapping = Some(ResultMapping::Nested(Arc::new(mapper)));
        self
    }

    /// Map each row on its own; applied by both `query` and `query_cursor`
    pub fn row_transform(mut self, transform: impl RowTransform + 'static) -> Self {
        self.statement.result_mapping = Some(ResultMapping::Rows(Arc::new(transform)));
        self
    }

    pub fn cache(mut self, cache: Arc<SharedCache>) -> Self {
        self.statement.cache = Some(cache);
        self
    }

    pub fn build(self) -> MappedStatement {
        self.statement
    }
}
