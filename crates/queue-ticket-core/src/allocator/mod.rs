//! Sequence allocation: one gapless, 1-based sequence per service point per day.
//!
//! The counter row is the only shared mutable state in the system. Every
//! allocation runs inside a `BEGIN IMMEDIATE` transaction, so the SQLite
//! write lock serializes allocators across threads and processes that share
//! the database file. Lock waits beyond the connection's busy timeout come
//! back as transient errors and are retried by [`RetryPolicy`].

mod retry;

pub use retry::*;

use rusqlite::Connection;
use thiserror::Error;

use crate::config::TicketConfig;
use crate::db::{self, Database, DbError, DbResult};
use crate::models::CounterKey;

/// Allocation errors.
#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("Counter still contended after {attempts} attempts")]
    Contention { attempts: u32 },

    #[error("Allocation timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Storage error: {0}")]
    Storage(#[source] DbError),
}

impl From<DbError> for AllocationError {
    fn from(e: DbError) -> Self {
        AllocationError::Storage(e)
    }
}

impl From<RetryError<DbError>> for AllocationError {
    fn from(e: RetryError<DbError>) -> Self {
        match e {
            RetryError::Exhausted { attempts, .. } => AllocationError::Contention { attempts },
            RetryError::DeadlineExceeded { elapsed_ms } => AllocationError::Timeout { elapsed_ms },
            RetryError::Fatal(e) => AllocationError::Storage(e),
        }
    }
}

pub type AllocationResult<T> = Result<T, AllocationError>;

/// Keyed counter storage with an atomic increment-or-create.
pub trait CounterStore {
    /// Advance the counter for `key` and return the new value.
    ///
    /// Creates the counter at 1 when absent. Must never hand out the same
    /// value twice for one key.
    fn increment_or_init(&self, key: &CounterKey) -> DbResult<u32>;

    /// Last value handed out for `key`, if any.
    fn current_value(&self, key: &CounterKey) -> DbResult<Option<u32>>;
}

impl CounterStore for Connection {
    fn increment_or_init(&self, key: &CounterKey) -> DbResult<u32> {
        db::increment_or_init_counter(self, key)
    }

    fn current_value(&self, key: &CounterKey) -> DbResult<Option<u32>> {
        db::current_counter_value(self, key)
    }
}

/// Hands out per-(service point, date) sequence numbers.
#[derive(Debug, Clone, Copy)]
pub struct SequenceAllocator {
    retry: RetryPolicy,
}

impl SequenceAllocator {
    /// Create an allocator with the given retry policy.
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    /// Create an allocator using the retry settings from configuration.
    pub fn from_config(config: &TicketConfig) -> Self {
        Self::new(RetryPolicy::from_config(config))
    }

    /// Retry policy used by [`next_sequence`](Self::next_sequence).
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Allocate the next sequence for `key` in a transaction of its own.
    ///
    /// Under concurrent callers each call gets a distinct value, and the values
    /// handed out for a key are exactly `1..=n`.
    pub fn next_sequence(&self, db: &mut Database, key: CounterKey) -> AllocationResult<u32> {
        let sequence = self.retry.run(None, |_attempt| -> DbResult<u32> {
            let tx = db.immediate_transaction()?;
            let sequence = self.allocate(&*tx, &key)?;
            tx.commit()?;
            Ok(sequence)
        })?;
        Ok(sequence)
    }

    /// Allocate within a transaction the caller already holds.
    ///
    /// The caller must hold the database write lock (an IMMEDIATE
    /// transaction) and is responsible for commit; a rollback returns the
    /// number to the pool.
    pub fn allocate<S: CounterStore + ?Sized>(&self, store: &S, key: &CounterKey) -> DbResult<u32> {
        let sequence = store.increment_or_init(key)?;
        if sequence == 1 {
            tracing::debug!(counter = %key, "Daily counter initialized");
        } else {
            tracing::debug!(counter = %key, sequence, "Daily counter advanced");
        }
        Ok(sequence)
    }
}

impl Default for SequenceAllocator {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServicePoint;
    use chrono::NaiveDate;

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        for (id, code) in [(5, "CLN01"), (6, "CLN02")] {
            db.upsert_service_point(&ServicePoint::new(id, code.into(), code.into()))
                .unwrap();
        }
        db
    }

    fn key(point: i64, date: (i32, u32, u32)) -> CounterKey {
        CounterKey::new(point, NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap())
    }

    #[test]
    fn test_sequential_calls_are_monotonic() {
        let mut db = setup_db();
        let allocator = SequenceAllocator::default();
        let k = key(5, (2024, 1, 1));

        let values: Vec<u32> = (0..10)
            .map(|_| allocator.next_sequence(&mut db, k).unwrap())
            .collect();

        assert_eq!(values, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_keys_are_independent() {
        let mut db = setup_db();
        let allocator = SequenceAllocator::default();

        let a = key(5, (2024, 1, 1));
        let b = key(6, (2024, 1, 1));
        let c = key(5, (2024, 1, 2));

        allocator.next_sequence(&mut db, a).unwrap();
        allocator.next_sequence(&mut db, a).unwrap();
        allocator.next_sequence(&mut db, a).unwrap();

        assert_eq!(allocator.next_sequence(&mut db, b).unwrap(), 1);
        assert_eq!(allocator.next_sequence(&mut db, c).unwrap(), 1);
        assert_eq!(db.conn().current_value(&a).unwrap(), Some(3));
    }

    #[test]
    fn test_far_dates_accepted() {
        let mut db = setup_db();
        let allocator = SequenceAllocator::default();

        assert_eq!(allocator.next_sequence(&mut db, key(5, (1900, 1, 1))).unwrap(), 1);
        assert_eq!(allocator.next_sequence(&mut db, key(5, (2999, 12, 31))).unwrap(), 1);
    }

    #[test]
    fn test_rollback_returns_number() {
        let mut db = setup_db();
        let allocator = SequenceAllocator::default();
        let k = key(5, (2024, 1, 1));

        {
            let tx = db.immediate_transaction().unwrap();
            assert_eq!(allocator.allocate(&*tx, &k).unwrap(), 1);
            // dropped without commit
        }

        assert_eq!(db.conn().current_value(&k).unwrap(), None);
        assert_eq!(allocator.next_sequence(&mut db, k).unwrap(), 1);
    }

    #[test]
    fn test_storage_error_is_not_retried() {
        let mut db = setup_db();
        let allocator = SequenceAllocator::default();

        let err = allocator
            .next_sequence(&mut db, key(99, (2024, 1, 1)))
            .unwrap_err();
        assert!(matches!(err, AllocationError::Storage(_)));
    }
}
