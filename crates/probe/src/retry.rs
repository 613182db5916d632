//! Retry wrapper shared by all fetch strategies

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// How many attempts to make and how long to wait between them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least 1
    pub max_attempts: u32,
    /// Pause between two attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Exactly one attempt
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

/// The last attempt's value plus how many attempts were made
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// Run `op` until `done` accepts its value or the policy is exhausted.
///
/// `op` receives the 1-based attempt number. The delay is observed between
/// attempts only, never after the last one.
pub async fn retry<T, Op, Fut, Done>(policy: RetryPolicy, mut op: Op, mut done: Done) -> Retried<T>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = T>,
    Done: FnMut(&T) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let value = op(attempt).await;
        if done(&value) || attempt >= max_attempts {
            return Retried { value, attempts: attempt };
        }
        warn!("Attempt {}/{} failed, retrying in {:?}", attempt, max_attempts, policy.delay);
        if !policy.delay.is_zero() {
            sleep(policy.delay).await;
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts_with_delay() {
        let policy = RetryPolicy::new(3, Duration::from_millis(2000));
        let start = Instant::now();
        let mut seen = Vec::new();

        let result = retry(
            policy,
            |attempt| {
                seen.push(attempt);
                async move { Err::<(), _>(attempt) }
            },
            |r| r.is_ok(),
        )
        .await;

        assert_eq!(result.attempts, 3);
        assert_eq!(result.value, Err(3));
        assert_eq!(seen, vec![1, 2, 3]);
        // two gaps between three attempts
        assert_eq!(start.elapsed(), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_first_success() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        let start = Instant::now();

        let result = retry(policy, |attempt| async move { attempt }, |&a| a == 2).await;

        assert_eq!(result.value, 2);
        assert_eq!(result.attempts, 2);
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_once_makes_single_attempt() {
        let mut calls = 0;
        let result = retry(
            RetryPolicy::once(),
            |_| {
                calls += 1;
                async { false }
            },
            |&ok| ok,
        )
        .await;
        assert_eq!(calls, 1);
        assert_eq!(result.attempts, 1);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
