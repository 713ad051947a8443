//! Runtime Registry
//!
//! [`Configuration`] is the shared, long-lived half of the engine: settings,
//! registered statements, shared caches, the type registry and the property
//! accessor. Executors are short-lived and created from it, one per unit of
//! work.
//!
//! ## Architecture
//!
//! ```text
//! Configuration (Arc, shared by every executor)
//! ├── Config            loaded settings
//! ├── Statements        RwLock<HashMap<id, Arc<MappedStatement>>>
//! ├── Shared caches     RwLock<HashMap<namespace, Arc<SharedCache>>>
//! ├── TypeRegistry      types bound directly as one parameter
//! └── PropertyAccessor  reads/writes properties of structured values
//! ```
//!
//! Registration may happen after the configuration is shared; lookups take
//! a read lock and clone the `Arc`.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::cache::SharedCache;
use crate::config::{Config, ExecutorKind};
use crate::error::{ExecutorError, ExecutorResult};
use crate::executor::{
    BatchStrategy, CachingExecutor, ExecutionStrategy, Executor, SimpleStrategy, SqlExecutor,
};
use crate::mapping::{
    BoundStatement, CommandKind, MappedStatement, MappedStatementBuilder, PathAccessor,
    PropertyAccessor, SqlSource, TypeRegistry,
};
use crate::transaction::Transaction;
use crate::value::Value;

/// Settings and registries shared by every executor
pub struct Configuration {
    settings: Config,
    statements: RwLock<HashMap<String, Arc<MappedStatement>>>,
    caches: RwLock<HashMap<String, Arc<SharedCache>>>,
    type_registry: TypeRegistry,
    accessor: Arc<dyn PropertyAccessor>,
}

impl Configuration {
    pub fn new(settings: Config) -> Self {
        Configuration {
            settings,
            statements: RwLock::new(HashMap::new()),
            caches: RwLock::new(HashMap::new()),
            type_registry: TypeRegistry::default(),
            accessor: Arc::new(PathAccessor),
        }
    }

    /// Replace the property accessor
    pub fn with_accessor(mut self, accessor: impl PropertyAccessor + 'static) -> Self {
        self.accessor = Arc::new(accessor);
        self
    }

    /// Replace the type registry
    pub fn with_type_registry(mut self, registry: TypeRegistry) -> Self {
        self.type_registry = registry;
        self
    }

    pub fn settings(&self) -> &Config {
        &self.settings
    }

    /// Environment id folded into cache keys
    pub fn environment_id(&self) -> Option<&str> {
        self.settings.session.environment.as_deref()
    }

    pub fn accessor(&self) -> &dyn PropertyAccessor {
        self.accessor.as_ref()
    }

    pub fn type_registry(&self) -> &TypeRegistry {
        &self.type_registry
    }

    /// Statement builder seeded with the configured cache scope and timeout
    pub fn statement_builder(
        &self,
        id: impl Into<String>,
        command: CommandKind,
        source: impl SqlSource + 'static,
    ) -> MappedStatementBuilder {
        MappedStatement::builder(id, command, source)
            .cache_scope(self.settings.session.local_cache_scope)
            .timeout(self.settings.session.default_statement_timeout())
    }

    /// Register a statement. Ids must be unique.
    ///
    /// A statement built without an explicit cache scope takes the configured one.
    pub fn add_statement(&self, mut statement: MappedStatement) -> ExecutorResult<Arc<MappedStatement>> {
        let mut statements = self.statements.write();
        if statements.contains_key(statement.id()) {
            return Err(ExecutorError::DuplicateStatement(statement.id().to_string()));
        }
        statement.inherit_cache_scope(self.settings.session.local_cache_scope);
        let statement = Arc::new(statement);
        statements.insert(statement.id().to_string(), Arc::clone(&statement));
        Ok(statement)
    }

    pub fn statement(&self, id: &str) -> ExecutorResult<Arc<MappedStatement>> {
        self.statements
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ExecutorError::UnknownStatement(id.to_string()))
    }

    pub fn has_statement(&self, id: &str) -> bool {
        self.statements.read().contains_key(id)
    }

    /// Shared cache for `namespace`, created from the `[cache]` settings on first use
    pub fn cache(&self, namespace: &str) -> Arc<SharedCache> {
        if let Some(cache) = self.caches.read().get(namespace) {
            return Arc::clone(cache);
        }
        let mut caches = self.caches.write();
        let cache = caches
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(SharedCache::from_config(namespace, &self.settings.cache)));
        Arc::clone(cache)
    }

    /// Register a preconfigured shared cache, replacing any with the same id
    pub fn add_cache(&self, cache: Arc<SharedCache>) {
        self.caches.write().insert(cache.id().to_string(), cache);
    }

    /// Value bound for `property` in one invocation.
    ///
    /// Resolution order: additional parameter of the bound statement, `Null`
    /// for a null parameter object, the parameter object itself when its type
    /// binds directly, otherwise the property read through the accessor.
    pub fn parameter_value(&self, bound: &BoundStatement, parameter: &Value, property: &str) -> Value {
        if bound.has_additional_parameter(property) {
            bound.additional_parameter(property, self.accessor())
        } else if parameter.is_null() {
            Value::Null
        } else if self.type_registry.has_handler(parameter) {
            parameter.clone()
        } else {
            self.accessor.get(parameter, property)
        }
    }

    /// Concrete executor for one unit of work
    pub fn executor(self: &Arc<Self>, transaction: Box<dyn Transaction>, kind: ExecutorKind) -> Executor {
        let strategy: Arc<dyn ExecutionStrategy> = match kind {
            ExecutorKind::Simple => Arc::new(SimpleStrategy),
            ExecutorKind::Batch => Arc::new(BatchStrategy::new()),
        };
        Executor::new(Arc::clone(self), transaction, strategy)
    }

    /// Executor for one unit of work, with the shared cache layer when enabled.
    ///
    /// `None` selects the configured default strategy.
    pub fn new_executor(
        self: &Arc<Self>,
        transaction: Box<dyn Transaction>,
        kind: Option<ExecutorKind>,
    ) -> Box<dyn SqlExecutor> {
        let kind = kind.unwrap_or(self.settings.session.default_executor);
        let executor = self.executor(transaction, kind);
        if self.settings.session.cache_enabled {
            Box::new(CachingExecutor::new(executor))
        } else {
            Box::new(executor)
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration::new(Config::default())
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("settings", &self.settings)
            .field("statements", &self.statements.read().len())
            .field("caches", &self.caches.read().len())
            .field("type_registry", &self.type_registry)
            .finish()
    }
}
