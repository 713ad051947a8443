//! Transaction that drives commit and rollback on its own connection.

use std::time::Duration;

use super::Transaction;
use crate::connection::Connection;
use crate::error::DbError;

/// Owns a connection and forwards commit/rollback to it.
///
/// The requested auto-commit mode is applied on first use. Commit and
/// rollback are skipped while auto-commit is on. On close, auto-commit is
/// switched back on before the connection is closed, so a pooled connection
/// is returned in its default state.
pub struct DirectTransaction<C> {
    connection: C,
    desired_auto_commit: bool,
    auto_commit_applied: bool,
    timeout: Option<Duration>,
    closed: bool,
}

impl<C: Connection> DirectTransaction<C> {
    pub fn new(connection: C, auto_commit: bool) -> Self {
        DirectTransaction {
            connection,
            desired_auto_commit: auto_commit,
            auto_commit_applied: false,
            timeout: None,
            closed: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn open(&mut self) -> Result<&mut C, DbError> {
        if self.closed {
            return Err(DbError::TransactionClosed);
        }
        if !self.auto_commit_applied {
            if self.connection.auto_commit() != self.desired_auto_commit {
                tracing::debug!(
                    auto_commit = self.desired_auto_commit,
                    "setting_connection_auto_commit"
                );
                self.connection.set_auto_commit(self.desired_auto_commit)?;
            }
            self.auto_commit_applied = true;
        }
        Ok(&mut self.connection)
    }

    fn reset_auto_commit(&mut self) {
        if !self.connection.auto_commit() {
            // Some drivers require commit/rollback before close; auto-commit on keeps them quiet
            if let Err(e) = self.connection.set_auto_commit(true) {
                tracing::debug!(error = %e, "reset_auto_commit_failed");
            }
        }
    }
}

impl<C: Connection + 'static> Transaction for DirectTransaction<C> {
    fn connection(&mut self) -> Result<&mut dyn Connection, DbError> {
        Ok(self.open()?)
    }

    fn commit(&mut self) -> Result<(), DbError> {
        if self.closed || !self.auto_commit_applied {
            return Ok(());
        }
        if !self.connection.auto_commit() {
            tracing::debug!("committing_connection");
            self.connection.commit()?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        if self.closed || !self.auto_commit_applied {
            return Ok(());
        }
        if !self.connection.auto_commit() {
            tracing::debug!("rolling_back_connection");
            self.connection.rollback()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), DbError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.reset_auto_commit();
        self.connection.close()
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
