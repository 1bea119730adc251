//! Bounded retry for transient storage contention.

use std::time::{Duration, Instant};

use crate::config::TicketConfig;
use crate::db::DbError;

/// Errors that may succeed if the operation is simply tried again.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for DbError {
    fn is_transient(&self) -> bool {
        DbError::is_transient(self)
    }
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed transiently; carries the last failure.
    Exhausted { attempts: u32, last: E },
    /// The caller's deadline passed before an attempt could start.
    DeadlineExceeded { elapsed_ms: u64 },
    /// A non-transient failure; not retried.
    Fatal(E),
}

/// Overall time budget for one operation.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    /// Start the clock now.
    pub fn after(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.started.elapsed() >= self.limit
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.started.elapsed())
    }
}

/// Retry schedule: up to `max_attempts` tries, sleeping `backoff * attempt`
/// between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &TicketConfig) -> Self {
        Self::new(config.max_allocation_attempts, config.retry_backoff)
    }

    /// Run `op` until it succeeds, fails for good, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. The deadline, if any, is
    /// checked before every attempt, and no backoff sleeps past it.
    pub fn run<T, E, F>(&self, deadline: Option<&Deadline>, mut op: F) -> Result<T, RetryError<E>>
    where
        E: Transient + std::fmt::Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        let mut attempt = 1;
        loop {
            if let Some(deadline) = deadline {
                if deadline.is_expired() {
                    return Err(RetryError::DeadlineExceeded {
                        elapsed_ms: deadline.elapsed_ms(),
                    });
                }
            }

            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(RetryError::Fatal(e)),
                Err(e) if attempt >= self.max_attempts => {
                    tracing::warn!(attempts = attempt, error = %e, "Giving up after repeated storage contention");
                    return Err(RetryError::Exhausted { attempts: attempt, last: e });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Storage contention, retrying"
                    );
                    std::thread::sleep(self.pause_after(attempt, deadline));
                    attempt += 1;
                }
            }
        }
    }
}

impl RetryPolicy {
    fn pause_after(&self, attempt: u32, deadline: Option<&Deadline>) -> Duration {
        let pause = self.backoff.checked_mul(attempt).unwrap_or(Duration::MAX);
        match deadline {
            Some(deadline) => pause.min(deadline.remaining()),
            None => pause,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(50))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Flaky(bool);

    impl std::fmt::Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky(transient={})", self.0)
        }
    }

    impl Transient for Flaky {
        fn is_transient(&self) -> bool {
            self.0
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[test]
    fn test_succeeds_after_transient_failures() {
        let result = fast_policy(3).run(None, |attempt| {
            if attempt < 3 {
                Err(Flaky(true))
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_exhausts_attempts() {
        let mut calls = 0;
        let result: Result<(), _> = fast_policy(3).run(None, |_| {
            calls += 1;
            Err(Flaky(true))
        });

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 3, .. })));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_fatal_error_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = fast_policy(3).run(None, |_| {
            calls += 1;
            Err(Flaky(false))
        });

        assert!(matches!(result, Err(RetryError::Fatal(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_expired_deadline_skips_attempt() {
        let deadline = Deadline::after(Duration::ZERO);
        let mut calls = 0;
        let result: Result<(), RetryError<Flaky>> = fast_policy(3).run(Some(&deadline), |_| {
            calls += 1;
            Ok(())
        });

        assert!(matches!(result, Err(RetryError::DeadlineExceeded { .. })));
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_backoff_stops_at_deadline() {
        let policy = RetryPolicy::new(3, Duration::from_secs(3600));
        let deadline = Deadline::after(Duration::from_millis(30));
        let started = Instant::now();

        let result: Result<(), _> = policy.run(Some(&deadline), |_| Err(Flaky(true)));

        assert!(matches!(result, Err(RetryError::DeadlineExceeded { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_huge_backoff_does_not_overflow() {
        let policy = RetryPolicy::new(5, Duration::MAX);
        let deadline = Deadline::after(Duration::from_millis(10));

        assert_eq!(policy.pause_after(3, None), Duration::MAX);
        assert!(policy.pause_after(3, Some(&deadline)) <= Duration::from_millis(10));

        let result: Result<(), _> = policy.run(Some(&deadline), |_| Err(Flaky(true)));
        assert!(matches!(result, Err(RetryError::DeadlineExceeded { .. })));
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
