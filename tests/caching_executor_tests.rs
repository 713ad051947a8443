//! Shared (second-level) cache layered over the session executor.

mod common;

use std::sync::Arc;

use common::{configuration, executor, journal, user, ScriptedConnection, SharedJournal};
use sqlsession::{
    CachingExecutor, CommandKind, Config, Configuration, DirectTransaction, ExecutorError,
    MappedStatement, ParameterMapping, ParameterMode, RowBounds, SqlExecutor, StaticSqlSource,
    Value,
};

fn find_by_id(configuration: &Configuration) -> Arc<MappedStatement> {
    let source = StaticSqlSource::new(
        "SELECT id, name FROM users WHERE id = ?",
        vec![ParameterMapping::new("id")],
    );
    configuration
        .add_statement(
            configuration
                .statement_builder("findById", CommandKind::Read, source)
                .cache(configuration.cache("users"))
                .build(),
        )
        .unwrap()
}

fn rename_user(configuration: &Configuration) -> Arc<MappedStatement> {
    let source = StaticSqlSource::new(
        "UPDATE users SET name = ? WHERE id = ?",
        vec![ParameterMapping::new("name"), ParameterMapping::new("id")],
    );
    configuration
        .add_statement(
            configuration
                .statement_builder("renameUser", CommandKind::Write, source)
                .cache(configuration.cache("users"))
                .build(),
        )
        .unwrap()
}

fn session(configuration: &Arc<Configuration>, journal: &SharedJournal) -> Box<dyn SqlExecutor> {
    let connection = ScriptedConnection::new(journal).on_query(|_| Ok(vec![user(7, "ada")]));
    configuration.new_executor(Box::new(DirectTransaction::new(connection, false)), None)
}

fn by_id(id: i64) -> Value {
    Value::object([("id", Value::from(id))])
}

#[test]
fn test_results_published_on_commit() {
    let configuration = configuration(Config::default());
    let find = find_by_id(&configuration);
    let journal = journal();

    let mut first = session(&configuration, &journal);
    first.query(&find, &by_id(7), RowBounds::default(), None).unwrap();
    assert!(configuration.cache("users").is_empty());

    let mut second = session(&configuration, &journal);
    second.query(&find, &by_id(7), RowBounds::default(), None).unwrap();
    assert_eq!(journal.lock().query_count("findById"), 2);

    first.commit(true).unwrap();
    assert_eq!(configuration.cache("users").len(), 1);

    let mut third = session(&configuration, &journal);
    let rows = third.query(&find, &by_id(7), RowBounds::default(), None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(journal.lock().query_count("findById"), 2);
    assert_eq!(configuration.cache("users").stats().hits, 1);
}

#[test]
fn test_rollback_discards_staged_results() {
    let configuration = configuration(Config::default());
    let find = find_by_id(&configuration);
    let journal = journal();

    let mut first = session(&configuration, &journal);
    first.query(&find, &by_id(7), RowBounds::default(), None).unwrap();
    first.rollback(true).unwrap();
    first.close(false);

    assert!(configuration.cache("users").is_empty());
}

#[test]
fn test_close_without_rollback_publishes() {
    let configuration = configuration(Config::default());
    let find = find_by_id(&configuration);
    let journal = journal();

    let mut first = session(&configuration, &journal);
    first.query(&find, &by_id(7), RowBounds::default(), None).unwrap();
    first.close(false);
    assert_eq!(configuration.cache("users").len(), 1);

    let mut second = session(&configuration, &journal);
    second.query(&find, &by_id(8), RowBounds::default(), None).unwrap();
    second.close(true);
    assert_eq!(configuration.cache("users").len(), 1);
}

#[test]
fn test_write_clears_shared_cache_on_commit() {
    let configuration = configuration(Config::default());
    let find = find_by_id(&configuration);
    let rename = rename_user(&configuration);
    let journal = journal();

    let mut warm = session(&configuration, &journal);
    warm.query(&find, &by_id(7), RowBounds::default(), None).unwrap();
    warm.commit(true).unwrap();
    assert_eq!(configuration.cache("users").len(), 1);

    let mut writer = session(&configuration, &journal);
    let renamed = Value::object([("id", Value::from(7i64)), ("name", Value::from("lovelace"))]);
    writer.update(&rename, &renamed).unwrap();
    // hidden from the writer, still visible to others until commit
    writer.query(&find, &by_id(7), RowBounds::default(), None).unwrap();
    assert_eq!(journal.lock().query_count("findById"), 2);
    assert_eq!(configuration.cache("users").len(), 1);

    writer.commit(true).unwrap();
    let cache = configuration.cache("users");
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.stats().hits, 0);
}

#[test]
fn test_use_cache_false_bypasses_shared_cache() {
    let configuration = configuration(Config::default());
    let statement = configuration
        .add_statement(
            configuration
                .statement_builder(
                    "findFresh",
                    CommandKind::Read,
                    StaticSqlSource::new("SELECT * FROM users WHERE id = ?", vec![ParameterMapping::new("id")]),
                )
                .cache(configuration.cache("users"))
                .use_cache(false)
                .build(),
        )
        .unwrap();
    let journal = journal();

    let mut first = session(&configuration, &journal);
    first.query(&statement, &by_id(7), RowBounds::default(), None).unwrap();
    first.commit(true).unwrap();
    assert!(configuration.cache("users").is_empty());
}

#[test]
fn test_procedure_with_out_params_cannot_use_shared_cache() {
    let configuration = configuration(Config::default());
    let statement = configuration
        .add_statement(
            MappedStatement::builder(
                "userStats",
                CommandKind::ProcedureCall,
                StaticSqlSource::new(
                    "{call user_stats(?, ?)}",
                    vec![
                        ParameterMapping::new("id"),
                        ParameterMapping::new("total").with_mode(ParameterMode::Out),
                    ],
                ),
            )
            .use_cache(true)
            .cache(configuration.cache("stats"))
            .build(),
        )
        .unwrap();
    let journal = journal();
    let mut executor = CachingExecutor::new(executor(&configuration, ScriptedConnection::new(&journal)));

    let err = executor.query(&statement, &by_id(7), RowBounds::default(), None).unwrap_err();
    assert!(matches!(err, ExecutorError::OutParametersNotCacheable(ref id) if id == "userStats"));
    assert!(journal.lock().calls.is_empty());
}

#[test]
fn test_disabled_cache_returns_plain_executor() {
    let mut settings = Config::default();
    settings.session.cache_enabled = false;
    let configuration = configuration(settings);
    let find = find_by_id(&configuration);
    let journal = journal();

    let mut first = session(&configuration, &journal);
    first.query(&find, &by_id(7), RowBounds::default(), None).unwrap();
    first.commit(true).unwrap();

    assert!(configuration.cache("users").is_empty());
}

#[test]
fn test_decorator_delegates_local_cache_queries() {
    let configuration = configuration(Config::default());
    let find = find_by_id(&configuration);
    let journal = journal();
    let connection = ScriptedConnection::new(&journal).on_query(|_| Ok(vec![user(7, "ada")]));
    let mut executor = CachingExecutor::new(executor(&configuration, connection));

    executor.query(&find, &by_id(7), RowBounds::default(), None).unwrap();
    let bound = find.bound_statement(&by_id(7));
    let key = executor.create_cache_key(&find, &by_id(7), RowBounds::default(), &bound).unwrap();
    assert!(executor.is_cached(&find, &key).unwrap());
    assert!(executor.delegate().is_cached(&find, &key).unwrap());

    executor.clear_local_cache();
    assert!(!executor.is_cached(&find, &key).unwrap());
}

#[test]
fn test_closed_session_does_not_read_shared_cache() {
    let configuration = configuration(Config::default());
    let find = find_by_id(&configuration);
    let rename = rename_user(&configuration);
    let journal = journal();

    let mut writer = session(&configuration, &journal);
    writer.query(&find, &by_id(7), RowBounds::default(), None).unwrap();
    writer.commit(true).unwrap();
    assert_eq!(configuration.cache("users").len(), 1);

    let mut closed = session(&configuration, &journal);
    closed.close(false);

    let bound = find.bound_statement(&by_id(7));
    let key = writer.create_cache_key(&find, &by_id(7), RowBounds::default(), &bound).unwrap();
    let err = closed
        .query_with_key(&find, &by_id(7), RowBounds::default(), None, key, &bound)
        .unwrap_err();
    assert!(matches!(err, ExecutorError::Closed));
    assert!(matches!(
        closed.query(&find, &by_id(7), RowBounds::default(), None),
        Err(ExecutorError::Closed)
    ));
    assert!(matches!(
        closed.update(&rename, &Value::object([("id", Value::from(7)), ("name", Value::from("bo"))])),
        Err(ExecutorError::Closed)
    ));
    assert!(closed.query_cursor(&find, &by_id(7), RowBounds::default()).is_err());
    assert!(closed.rollback(true).is_ok());

    assert_eq!(configuration.cache("users").stats().hits, 0);
    assert_eq!(configuration.cache("users").len(), 1);
}
