//! Transaction whose boundaries belong to an outer container.

use std::time::Duration;

use super::Transaction;
use crate::connection::Connection;
use crate::error::DbError;

/// Leaves commit and rollback to whoever manages the connection.
///
/// Closing only closes the connection when `close_connection` was requested.
pub struct ManagedTransaction<C> {
    connection: C,
    close_connection: bool,
    timeout: Option<Duration>,
    closed: bool,
}

impl<C: Connection> ManagedTransaction<C> {
    pub fn new(connection: C, close_connection: bool) -> Self {
        ManagedTransaction {
            connection,
            close_connection,
            timeout: None,
            closed: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl<C: Connection + 'static> Transaction for ManagedTransaction<C> {
    fn connection(&mut self) -> Result<&mut dyn Connection, DbError> {
        if self.closed {
            return Err(DbError::TransactionClosed);
        }
        Ok(&mut self.connection)
    }

    fn commit(&mut self) -> Result<(), DbError> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), DbError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.close_connection {
            tracing::debug!("closing_managed_connection");
            self.connection.close()?;
        }
        Ok(())
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
