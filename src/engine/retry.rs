//! engine::retry
//!
//! Fixed-count, fixed-delay retry policy.
//!
//! # Design
//!
//! The forge's PR search index lags behind merges, so a search for recently
//! merged PRs can come back empty. The policy re-runs an injected async query
//! until a stop predicate accepts the result or the attempts run out. There
//! is no backoff, and running out of attempts is not an error: the last
//! result is returned as-is.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use codeflow_health::engine::retry::RetryPolicy;
//!
//! # tokio_test::block_on(async {
//! let policy = RetryPolicy::new(3, Duration::ZERO);
//! let outcome = policy
//!     .run(|attempt| async move { if attempt < 2 { vec![] } else { vec![attempt] } },
//!          |rows: &Vec<u32>| !rows.is_empty())
//!     .await;
//!
//! assert_eq!(outcome.value, vec![2]);
//! assert_eq!(outcome.attempts, 3);
//! # });
//! ```

use std::future::Future;
use std::time::Duration;

/// Max attempts plus the fixed delay between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

/// Result of running a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
    /// The last value produced.
    pub value: T,
    /// How many times the operation ran.
    pub attempts: u32,
    /// Whether the stop predicate accepted `value`.
    pub satisfied: bool,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until `stop` accepts its result or attempts are exhausted.
    ///
    /// `op` receives the zero-based attempt number. The delay is slept
    /// between attempts, never before the first.
    pub async fn run<T, F, Fut, S>(&self, mut op: F, stop: S) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = T>,
        S: Fn(&T) -> bool,
    {
        let mut attempt = 0;
        loop {
            if attempt > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let value = op(attempt).await;
            attempt += 1;

            if stop(&value) {
                return RetryOutcome {
                    value,
                    attempts: attempt,
                    satisfied: true,
                };
            }
            if attempt >= self.max_attempts {
                tracing::debug!(attempts = attempt, "retry attempts exhausted");
                return RetryOutcome {
                    value,
                    attempts: attempt,
                    satisfied: false,
                };
            }
        }
    }
}
