//! Shared fixtures: a scripted in-memory connection and executor builders.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use sqlsession::{
    CallOutcome, Config, Configuration, Connection, DbError, DirectTransaction, Executor,
    ExecutorKind, StatementRequest, Value,
};

type QueryFn = dyn Fn(&StatementRequest) -> Result<Vec<Value>, DbError> + Send + Sync;
type ExecuteFn = dyn Fn(&StatementRequest) -> Result<u64, DbError> + Send + Sync;
type CallFn = dyn Fn(&StatementRequest) -> Result<CallOutcome, DbError> + Send + Sync;

/// Everything the connection was asked to do
#[derive(Debug, Default)]
pub struct Journal {
    pub queries: Vec<StatementRequest>,
    pub executes: Vec<StatementRequest>,
    pub calls: Vec<StatementRequest>,
    pub auto_commit_changes: Vec<bool>,
    pub commits: usize,
    pub rollbacks: usize,
    pub closes: usize,
}

impl Journal {
    /// Number of reads issued for `statement_id`
    pub fn query_count(&self, statement_id: &str) -> usize {
        self.queries
            .iter()
            .filter(|r| r.statement_id == statement_id)
            .count()
    }

    pub fn execute_count(&self, statement_id: &str) -> usize {
        self.executes
            .iter()
            .filter(|r| r.statement_id == statement_id)
            .count()
    }
}

pub type SharedJournal = Arc<Mutex<Journal>>;

/// In-memory connection whose answers come from closures
pub struct ScriptedConnection {
    journal: SharedJournal,
    on_query: Arc<QueryFn>,
    on_execute: Arc<ExecuteFn>,
    on_call: Option<Arc<CallFn>>,
    auto_commit: bool,
    fail_close: bool,
}

impl ScriptedConnection {
    pub fn new(journal: &SharedJournal) -> Self {
        ScriptedConnection {
            journal: Arc::clone(journal),
            on_query: Arc::new(|_| Ok(Vec::new())),
            on_execute: Arc::new(|_| Ok(1)),
            on_call: None,
            auto_commit: true,
            fail_close: false,
        }
    }

    pub fn on_query(
        mut self,
        f: impl Fn(&StatementRequest) -> Result<Vec<Value>, DbError> + Send + Sync + 'static,
    ) -> Self {
        self.on_query = Arc::new(f);
        self
    }

    pub fn on_execute(
        mut self,
        f: impl Fn(&StatementRequest) -> Result<u64, DbError> + Send + Sync + 'static,
    ) -> Self {
        self.on_execute = Arc::new(f);
        self
    }

    pub fn on_call(
        mut self,
        f: impl Fn(&StatementRequest) -> Result<CallOutcome, DbError> + Send + Sync + 'static,
    ) -> Self {
        self.on_call = Some(Arc::new(f));
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

impl Connection for ScriptedConnection {
    fn query(&mut self, request: &StatementRequest) -> Result<Vec<Value>, DbError> {
        self.journal.lock().queries.push(request.clone());
        (self.on_query)(request)
    }

    fn execute(&mut self, request: &StatementRequest) -> Result<u64, DbError> {
        self.journal.lock().executes.push(request.clone());
        (self.on_execute)(request)
    }

    fn call(&mut self, request: &StatementRequest) -> Result<CallOutcome, DbError> {
        self.journal.lock().calls.push(request.clone());
        match &self.on_call {
            Some(f) => f(request),
            None => Ok(CallOutcome {
                rows: (self.on_query)(request)?,
                ..CallOutcome::default()
            }),
        }
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), DbError> {
        self.auto_commit = auto_commit;
        self.journal.lock().auto_commit_changes.push(auto_commit);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.journal.lock().commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.journal.lock().rollbacks += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DbError> {
        self.journal.lock().closes += 1;
        if self.fail_close {
            return Err(DbError::Connection("socket already gone".to_string()));
        }
        Ok(())
    }
}

pub fn journal() -> SharedJournal {
    Arc::new(Mutex::new(Journal::default()))
}

pub fn configuration(settings: Config) -> Arc<Configuration> {
    Arc::new(Configuration::new(settings))
}

/// Simple executor over `connection` in manual-commit mode
pub fn executor(configuration: &Arc<Configuration>, connection: ScriptedConnection) -> Executor {
    let tx = DirectTransaction::new(connection, false);
    configuration.executor(Box::new(tx), ExecutorKind::Simple)
}

pub fn batch_executor(configuration: &Arc<Configuration>, connection: ScriptedConnection) -> Executor {
    let tx = DirectTransaction::new(connection, false);
    configuration.executor(Box::new(tx), ExecutorKind::Batch)
}

/// Row `{id, name}`
pub fn user(id: i64, name: &str) -> Value {
    Value::object([("id", Value::from(id)), ("name", Value::from(name))])
}
