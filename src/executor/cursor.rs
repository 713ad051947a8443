//! Forward-only streaming results.

use std::fmt;
use std::sync::Arc;

use crate::connection::RowStream;
use crate::error::ExecutorResult;
use crate::mapping::{RowBounds, RowTransform};
use crate::value::Value;

/// Lazily fetched rows of one read.
///
/// Cursors bypass the local result store, cannot be restarted, and close
/// their stream when exhausted, when [`Cursor::close`] is called, or on drop.
/// Rows pass through the statement's row transform, if any.
pub struct Cursor {
    statement_id: String,
    stream: Option<Box<dyn RowStream>>,
    transform: Option<Arc<dyn RowTransform>>,
    bounds: RowBounds,
    /// Stream positions passed while honouring the offset, failed ones included
    skipped: usize,
    fetched: usize,
    consumed: bool,
}

impl Cursor {
    pub fn new(statement_id: impl Into<String>, stream: Box<dyn RowStream>, bounds: RowBounds) -> Self {
        Cursor {
            statement_id: statement_id.into(),
            stream: Some(stream),
            transform: None,
            bounds,
            skipped: 0,
            fetched: 0,
            consumed: false,
        }
    }

    /// Map every fetched row through `transform`
    pub fn with_transform(mut self, transform: Arc<dyn RowTransform>) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn statement_id(&self) -> &str {
        &self.statement_id
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Whether every row within the bounds has been read
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Index of the last row returned, `None` before the first
    pub fn current_index(&self) -> Option<usize> {
        self.fetched.checked_sub(1)
    }

    /// Release the underlying stream. Idempotent.
    pub fn close(&mut self) -> ExecutorResult<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.close()?;
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.consumed = true;
        if let Err(e) = self.close() {
            tracing::debug!(statement = %self.statement_id, error = %e, "cursor_close_failed");
        }
    }
}

impl Iterator for Cursor {
    type Item = ExecutorResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fetched >= self.bounds.limit {
            if self.is_open() {
                self.finish();
            }
            return None;
        }
        let stream = self.stream.as_mut()?;

        while self.skipped < self.bounds.offset {
            match stream.next() {
                Some(row) => {
                    self.skipped += 1;
                    if let Err(e) = row {
                        return Some(Err(e.into()));
                    }
                }
                None => {
                    self.finish();
                    return None;
                }
            }
        }

        match stream.next() {
            Some(Ok(row)) => {
                self.fetched += 1;
                match &self.transform {
                    Some(transform) => Some(transform.transform(row)),
                    None => Some(Ok(row)),
                }
            }
            Some(Err(e)) => Some(Err(e.into())),
            None => {
                self.finish();
                None
            }
        }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::debug!(statement = %self.statement_id, error = %e, "cursor_close_failed");
        }
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("statement_id", &self.statement_id)
            .field("open", &self.is_open())
            .field("consumed", &self.consumed)
            .field("skipped", &self.skipped)
            .field("fetched", &self.fetched)
            .finish()
    }
}
