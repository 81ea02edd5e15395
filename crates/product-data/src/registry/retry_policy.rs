//! Bounded retries with exponential backoff for a single source.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};

use crate::clock::Clock;
use crate::config::LookupConfig;
use crate::models::AdapterOutcome;

/// Retry policy applied to each source call.
///
/// Only [`AdapterOutcome::TransientError`] is retried. The delay after the
/// k-th failed attempt is `base_delay * 2^(k-1)`, capped at `max_delay`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    attempt_timeout: Duration,
}

/// Final outcome of a retried call and how many calls it took.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryOutcome {
    pub outcome: AdapterOutcome,
    pub attempts: u32,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one call.
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            attempt_timeout,
        }
    }

    pub fn from_config(config: &LookupConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.base_delay,
            config.max_delay,
            config.request_timeout,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Bound a single call by the per-attempt timeout.
    ///
    /// Expiry is reported as a transient error.
    pub async fn bounded<F>(&self, call: F) -> AdapterOutcome
    where
        F: Future<Output = AdapterOutcome>,
    {
        match tokio::time::timeout(self.attempt_timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => {
                AdapterOutcome::TransientError(format!("timed out after {:?}", self.attempt_timeout))
            }
        }
    }

    /// Run `op` until it returns a definitive outcome or attempts run out.
    ///
    /// Backoff delays go through `clock`, so they suspend only the calling
    /// task.
    pub async fn run<F, Fut>(&self, clock: &dyn Clock, label: &str, mut op: F) -> RetryOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AdapterOutcome>,
    {
        let mut attempt = 1;

        loop {
            let outcome = op().await;

            let message = match &outcome {
                AdapterOutcome::TransientError(message) => message.clone(),
                _ => {
                    return RetryOutcome {
                        outcome,
                        attempts: attempt,
                    }
                }
            };

            if attempt >= self.max_attempts {
                warn!(
                    "'{}' failed {} times, giving up: {}",
                    label, attempt, message
                );
                return RetryOutcome {
                    outcome,
                    attempts: attempt,
                };
            }

            let delay = self.delay_for(attempt);
            debug!(
                "'{}' attempt {}/{} failed ({}), retrying in {:?}",
                label, attempt, self.max_attempts, message, delay
            );
            clock.sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::ProductData;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(100),
            Duration::from_millis(350),
            Duration::from_secs(5),
        )
    }

    fn transient() -> AdapterOutcome {
        AdapterOutcome::TransientError("timeout".to_string())
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = policy(10);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for(40), Duration::from_millis(350));
    }

    #[test]
    fn test_zero_attempts_means_one_call() {
        assert_eq!(policy(0).max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_definitive_outcomes_are_not_retried() {
        let clock = ManualClock::default();
        let calls = &AtomicU32::new(0);

        let result = policy(3)
            .run(&clock, "TEST", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                AdapterOutcome::NotFound
            })
            .await;

        assert_eq!(result.outcome, AdapterOutcome::NotFound);
        assert_eq!(result.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let clock = ManualClock::default();
        let calls = &AtomicU32::new(0);

        let result = policy(3)
            .run(&clock, "TEST", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                transient()
            })
            .await;

        assert!(result.outcome.is_transient());
        assert_eq!(result.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[tokio::test]
    async fn test_recovers_after_transient_errors() {
        let clock = ManualClock::default();
        let script = &Mutex::new(vec![
            AdapterOutcome::Found(ProductData::default()),
            transient(),
        ]);

        let result = policy(3)
            .run(&clock, "TEST", || async move {
                script.lock().unwrap().pop().unwrap()
            })
            .await;

        assert!(matches!(result.outcome, AdapterOutcome::Found(_)));
        assert_eq!(result.attempts, 2);
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(100)]);
    }

    #[tokio::test]
    async fn test_bounded_turns_timeout_into_transient() {
        let policy = RetryPolicy::new(
            1,
            Duration::ZERO,
            Duration::ZERO,
            Duration::from_millis(10),
        );

        let outcome = policy
            .bounded(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                AdapterOutcome::NotFound
            })
            .await;

        assert!(outcome.is_transient());

        let outcome = policy.bounded(async { AdapterOutcome::NotFound }).await;
        assert_eq!(outcome, AdapterOutcome::NotFound);
    }
}
