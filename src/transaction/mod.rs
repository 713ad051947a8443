//! Unit-of-Work Boundary
//!
//! A [`Transaction`] owns one connection for the lifetime of an executor.
//! The executor interposes cache clearing and pending-write flushing around
//! its `commit`, `rollback` and `close`.
//!
//! | Implementation | commit / rollback | close |
//! |----------------|-------------------|-------|
//! | [`DirectTransaction`] | forwarded unless auto-commit | restores auto-commit, closes |
//! | [`ManagedTransaction`] | no-ops (container owns them) | closes if configured |

mod direct;
mod managed;

pub use direct::DirectTransaction;
pub use managed::ManagedTransaction;

use std::time::Duration;

use crate::connection::Connection;
use crate::error::DbError;

/// Transactional resource driving one unit of work
pub trait Transaction: Send {
    /// Connection bound to this unit of work
    fn connection(&mut self) -> Result<&mut dyn Connection, DbError>;

    fn commit(&mut self) -> Result<(), DbError>;

    fn rollback(&mut self) -> Result<(), DbError>;

    fn close(&mut self) -> Result<(), DbError>;

    /// Transaction-wide timeout, if any
    fn timeout(&self) -> Option<Duration>;
}

/// Effective statement timeout: the statement's own, capped by the transaction's
pub fn effective_timeout(
    statement: Option<Duration>,
    transaction: Option<Duration>,
) -> Option<Duration> {
    match (statement, transaction) {
        (Some(s), Some(t)) => Some(s.min(t)),
        (s, t) => s.or(t),
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::connection::{Connection, StatementRequest};
    use crate::error::DbError;
    use crate::value::Value;

    #[derive(Debug, Default)]
    pub struct Journal {
        pub auto_commit_changes: Vec<bool>,
        pub commits: usize,
        pub rollbacks: usize,
        pub closes: usize,
    }

    impl Journal {
        pub fn shared() -> Arc<Mutex<Journal>> {
            Arc::new(Mutex::new(Journal::default()))
        }
    }

    /// Connection that records lifecycle calls and returns no rows
    pub struct RecordingConnection {
        journal: Arc<Mutex<Journal>>,
        auto_commit: bool,
    }

    impl RecordingConnection {
        pub fn new(journal: &Arc<Mutex<Journal>>) -> Self {
            RecordingConnection {
                journal: Arc::clone(journal),
                auto_commit: true,
            }
        }
    }

    impl Connection for RecordingConnection {
        fn query(&mut self, _request: &StatementRequest) -> Result<Vec<Value>, DbError> {
            Ok(Vec::new())
        }

        fn execute(&mut self, _request: &StatementRequest) -> Result<u64, DbError> {
            Ok(0)
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
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_timeout() {
        let s = Duration::from_secs(5);
        let t = Duration::from_secs(2);
        assert_eq!(effective_timeout(Some(s), Some(t)), Some(t));
        assert_eq!(effective_timeout(Some(s), None), Some(s));
        assert_eq!(effective_timeout(None, Some(t)), Some(t));
        assert_eq!(effective_timeout(None, None), None);
    }
}
