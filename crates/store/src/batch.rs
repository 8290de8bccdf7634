//! Transaction batching for C5's write policy: bound a transaction by
//! whichever comes first of a max statement count or a max age, applied
//! statefully across many individual inserts rather than one literal SQL
//! blob.

use crate::error::{Result, StoreError};
use rusqlite::{params_from_iter, Connection, ToSql};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_MAX_STATEMENTS: u32 = 1000;
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(5);
const MAX_RETRY_ATTEMPTS: u32 = 5;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

pub struct TransactionBatcher<'a> {
    conn: &'a Connection,
    table: &'static str,
    statement_count: u32,
    max_statements: u32,
    started_at: Option<Instant>,
    max_age: Duration,
    active: bool,
}

impl<'a> TransactionBatcher<'a> {
    pub fn new(conn: &'a Connection, table: &'static str) -> Self {
        Self {
            conn,
            table,
            statement_count: 0,
            max_statements: DEFAULT_MAX_STATEMENTS,
            started_at: None,
            max_age: DEFAULT_MAX_AGE,
            active: false,
        }
    }

    pub fn with_limits(mut self, max_statements: u32, max_age: Duration) -> Self {
        self.max_statements = max_statements;
        self.max_age = max_age;
        self
    }

    fn ensure_started(&mut self) -> Result<()> {
        if !self.active {
            self.conn.execute_batch("BEGIN")?;
            self.active = true;
            self.started_at = Some(Instant::now());
            self.statement_count = 0;
        }
        Ok(())
    }

    fn should_flush(&self) -> bool {
        self.statement_count >= self.max_statements
            || self
                .started_at
                .map(|t| t.elapsed() >= self.max_age)
                .unwrap_or(false)
    }

    /// Run one parameterized write, retrying transient conflicts with
    /// exponential backoff (the writer with the older transaction wins;
    /// this writer is, by construction, the one retrying).
    pub fn execute(&mut self, sql: &str, params: &[&dyn ToSql]) -> Result<i64> {
        self.ensure_started()?;

        let mut attempt = 0;
        loop {
            match self.conn.execute(sql, params_from_iter(params.iter().copied())) {
                Ok(_) => {
                    self.statement_count += 1;
                    let rowid = self.conn.last_insert_rowid();
                    if self.should_flush() {
                        self.flush()?;
                    }
                    return Ok(rowid);
                }
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::DatabaseBusy && attempt < MAX_RETRY_ATTEMPTS =>
                {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                    warn!(table = self.table, attempt, ?delay, "write conflict, retrying");
                    std::thread::sleep(delay);
                    attempt += 1;
                    continue;
                }
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::DatabaseBusy =>
                {
                    return Err(StoreError::Conflict {
                        table: self.table.to_string(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.active {
            self.conn.execute_batch("COMMIT")?;
            debug!(table = self.table, statements = self.statement_count, "flushed batch");
            self.active = false;
        }
        Ok(())
    }
}

impl<'a> Drop for TransactionBatcher<'a> {
    fn drop(&mut self) {
        if self.active {
            let _ = self.conn.execute_batch("COMMIT");
        }
    }
}
