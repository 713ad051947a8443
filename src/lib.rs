//! # sqlsession
//!
//! Session-scoped SQL execution with a local result cache, in-flight
//! placeholders for recursive queries, deferred association loading, and
//! cache invalidation tied to the unit of work.
//!
//! ## Execution Pipeline
//!
//! ```text
//! MappedStatement + parameter
//!     ↓
//! [SqlSource]                   → BoundStatement (SQL + parameter mappings)
//!     ↓
//! [CacheKey builder]            → id + offset + limit + SQL + values + environment
//!     ↓
//! [CachingExecutor] (optional)  → shared cache, staged per unit of work
//!     ↓
//! [Executor]                    → local store lookup / InFlight placeholder
//!     ↓
//! [ExecutionStrategy]           → Simple | Batch
//!     ↓
//! [Transaction → Connection]    → raw rows
//!     ↓
//! [ResultMapping]               → mapped rows (nested mappers may run queries)
//!     ↓
//! Rows (Arc<Vec<Value>>)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sqlsession::{CommandKind, Config, Configuration, DirectTransaction, ParameterMapping,
//!                  RowBounds, SqlExecutor, StaticSqlSource, Value};
//!
//! let configuration = Arc::new(Configuration::new(Config::load()?));
//! let find_by_id = configuration.add_statement(
//!     configuration
//!         .statement_builder(
//!             "findById",
//!             CommandKind::Read,
//!             StaticSqlSource::new("SELECT * FROM users WHERE id = ?", vec![ParameterMapping::new("id")]),
//!         )
//!         .build(),
//! )?;
//!
//! let tx = DirectTransaction::new(connection, false);
//! let mut executor = configuration.new_executor(Box::new(tx), None);
//!
//! let param = Value::object([("id", Value::from(7))]);
//! let first = executor.query(&find_by_id, &param, RowBounds::default(), None)?;
//! let again = executor.query(&find_by_id, &param, RowBounds::default(), None)?; // local hit
//! assert!(Arc::ptr_eq(&first, &again));
//!
//! executor.commit(true)?;
//! executor.close(false);
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `cache` | Cache keys, local store, shared + transactional caches |
//! | `config` | Settings loading (TOML + environment) |
//! | `connection` | Driver-facing connection contract |
//! | `executor` | Execution template, strategies, cursor, deferred loads |
//! | `mapping` | Statement descriptors, parameter mappings, property access |
//! | `session` | Runtime registry and executor factory |
//! | `transaction` | Unit-of-work boundary |
//! | `value` | Dynamically typed values and shared objects |

pub mod cache;       // Cache keys, local store, shared caches
pub mod config;      // Configuration system
pub mod connection;  // Connection contract
pub mod error;
pub mod executor;    // Session executor and strategies
pub mod mapping;     // Statement descriptors
pub mod session;     // Runtime registry
pub mod transaction; // Unit-of-work boundary
pub mod value;

pub use cache::{build_cache_key, CacheKey, CacheSlot, LocalCache, SharedCache};
pub use config::{CacheScope, Config, ExecutorKind};
pub use connection::{BufferedRows, CallOutcome, Connection, RowStream, StatementRequest};
pub use error::{DbError, ExecutorError, ExecutorResult};
pub use executor::{
    BatchOutcome, BatchStrategy, CachingExecutor, Cursor, DeferredLoad, DeferredLoadQueue,
    ExecutionStrategy, Executor, ResultConsumer, SimpleStrategy, SqlExecutor,
    BATCH_UPDATE_RETURN_VALUE,
};
pub use mapping::{
    BoundStatement, CommandKind, MappedStatement, ParameterMapping, ParameterMode, PathAccessor,
    PropertyAccessor, ResultExtractor, ResultMapping, RowBounds, RowMapper, RowTransform,
    SqlSource, StaticSqlSource, TargetType, TypeRegistry,
};
pub use session::Configuration;
pub use transaction::{DirectTransaction, ManagedTransaction, Transaction};
pub use value::{DataType, ObjectRef, Rows, Value};
