//! Fixed-delay retry for transient git failures.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::{Backoff, Constant};
use tracing::debug;

use crate::error::GitError;

use super::classify::classify;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// `max_attempts` counts every attempt, the first one included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// An operation's result plus how many attempts it took.
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, GitError>,
    pub attempts: u32,
}

/// Run `attempt` until it succeeds, fails with a non-retryable error, or
/// the policy's attempts are used up.
///
/// Non-retryable errors are returned as-is after one attempt. Exhausting the
/// policy wraps the last error in [`GitError::RetriesExhausted`].
pub async fn retry_transient<T, Fut, F>(policy: &RetryPolicy, mut attempt: F) -> Attempted<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GitError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut backoff = Constant::new(policy.delay);
    let mut attempts = 0;

    loop {
        attempts += 1;

        let error = match attempt().await {
            Ok(value) => {
                return Attempted {
                    result: Ok(value),
                    attempts,
                };
            }
            Err(e) => e,
        };

        let category = classify(&error);
        if !category.is_retryable() {
            return Attempted {
                result: Err(error),
                attempts,
            };
        }

        if attempts >= max_attempts {
            return Attempted {
                result: Err(GitError::RetriesExhausted {
                    attempts,
                    last: Box::new(error),
                }),
                attempts,
            };
        }

        debug!(
            "Attempt {}/{} failed ({}): {}",
            attempts, max_attempts, category, error
        );
        if let Some(wait) = backoff.next_backoff() {
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn lock_error() -> GitError {
        GitError::CommandFailed {
            operation: "commit".to_string(),
            stderr: "fatal: Unable to create '.git/index.lock': File exists.".to_string(),
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_millis(500),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let outcome = retry_transient(&policy(3), || async { Ok::<_, GitError>("abc") }).await;
        assert_eq!(outcome.result.unwrap(), "abc");
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_use_every_attempt() {
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();
        let start = tokio::time::Instant::now();

        let outcome: Attempted<()> = retry_transient(&policy(4), move || {
            let c = count_clone.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(lock_error())
            }
        })
        .await;

        assert_eq!(count.load(Ordering::SeqCst), 4);
        assert_eq!(outcome.attempts, 4);
        assert!(matches!(
            outcome.result,
            Err(GitError::RetriesExhausted { attempts: 4, .. })
        ));
        // three fixed delays between four attempts
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_consumes_one_attempt() {
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();

        let outcome: Attempted<()> = retry_transient(&policy(5), move || {
            let c = count_clone.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(GitError::CommandFailed {
                    operation: "commit".to_string(),
                    stderr: "error: insufficient permission: Permission denied".to_string(),
                })
            }
        })
        .await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.attempts, 1);
        assert!(matches!(outcome.result, Err(GitError::CommandFailed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();

        let outcome = retry_transient(&policy(3), move || {
            let c = count_clone.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(lock_error())
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(outcome.result.unwrap(), 42);
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_tries_once() {
        let outcome: Attempted<()> = retry_transient(&policy(0), || async { Err(lock_error()) }).await;
        assert_eq!(outcome.attempts, 1);
    }
}
