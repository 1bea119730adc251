//! Database layer for queue ticket issuance.

mod schema;
mod reference;
mod patients;
mod counters;
mod registrations;
mod tokens;

pub use schema::*;
#[allow(unused_imports)]
pub use reference::*;
#[allow(unused_imports)]
pub use patients::*;
pub use counters::*;
#[allow(unused_imports)]
pub use registrations::*;
#[allow(unused_imports)]
pub use tokens::*;

use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default time a connection waits on a locked database before reporting busy.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl DbError {
    /// Whether the failure came from lock contention and may succeed on retry.
    pub fn is_transient(&self) -> bool {
        let DbError::Sqlite(e) = self;
        matches!(
            e.sqlite_error_code(),
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
        )
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open database at path with an explicit lock wait.
    ///
    /// Several connections (threads or processes) may share one file; the
    /// busy timeout bounds how long a writer waits for another to commit.
    pub fn open_with_busy_timeout<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction that takes the database write lock up front.
    ///
    /// Every read inside it sees a state no other writer can change until
    /// commit or rollback.
    pub fn immediate_transaction(&mut self) -> DbResult<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}
