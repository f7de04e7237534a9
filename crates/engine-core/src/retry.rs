use crate::clock::{Clock, SystemClock};
use std::future::Future;
use std::time::Duration;

/// Indicates whether an error should be retried or treated as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Stop,
}

/// Result of running an operation under the retry policy.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was considered fatal and should bubble up immediately.
    Fatal(E),
    /// The error was retryable, but the configured attempts were exhausted.
    AttemptsExceeded { error: E, attempts: usize },
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::AttemptsExceeded { error, .. } => error,
        }
    }
}

/// A failed attempt that is about to be retried.
#[derive(Debug)]
pub struct RetryAttempt<'a, E> {
    /// 1-based number of the attempt that just failed.
    pub attempt: usize,
    pub delay: Duration,
    pub error: &'a E,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: if max_delay.is_zero() {
                base_delay
            } else {
                max_delay
            },
        }
    }

    /// Preset for page requests against the sales API.
    pub fn for_network() -> Self {
        Self::new(5, Duration::from_secs(5), Duration::from_secs(60))
    }

    /// Sink calls get exactly one retry.
    pub fn for_sink(delay: Duration) -> Self {
        Self::new(2, delay, delay)
    }

    /// Executes the operation with the configured retry policy, sleeping on
    /// the tokio timer.
    pub async fn run<F, Fut, T, E, Classifier>(
        &self,
        op: F,
        classify: Classifier,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Classifier: Fn(&E) -> RetryDisposition,
    {
        self.run_with(&SystemClock, op, classify, |_| {}).await
    }

    /// Executes the operation, waiting on `clock` between attempts and
    /// reporting each retry to `on_retry` before the wait.
    pub async fn run_with<F, Fut, T, E, Classifier, OnRetry>(
        &self,
        clock: &dyn Clock,
        mut op: F,
        classify: Classifier,
        mut on_retry: OnRetry,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Classifier: Fn(&E) -> RetryDisposition,
        OnRetry: FnMut(&RetryAttempt<'_, E>),
    {
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(result) => return Ok(result),
                Err(err) => match classify(&err) {
                    RetryDisposition::Stop => return Err(RetryError::Fatal(err)),
                    RetryDisposition::Retry => {
                        if attempt + 1 >= self.max_attempts {
                            return Err(RetryError::AttemptsExceeded {
                                error: err,
                                attempts: attempt + 1,
                            });
                        }

                        let delay = self.backoff_delay(attempt);
                        on_retry(&RetryAttempt {
                            attempt: attempt + 1,
                            delay,
                            error: &err,
                        });
                        clock.sleep(delay).await;
                        attempt += 1;
                    }
                },
            }
        }
    }

    /// Delay after the `attempt`-th failure (0-based): `base * 2^attempt`,
    /// capped at `max_delay`.
    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::from_millis(0);
        }

        let factor = 1u128 << attempt.min(20);
        let base_ms = self.base_delay.as_millis();
        let delay_ms = base_ms.saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis());
        Duration::from_millis(capped as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::NaiveDate;
    use std::cell::Cell;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Timeout,
        Denied,
    }

    fn classify(err: &TestError) -> RetryDisposition {
        match err {
            TestError::Timeout => RetryDisposition::Retry,
            TestError::Denied => RetryDisposition::Stop,
        }
    }

    fn clock() -> ManualClock {
        ManualClock::new(
            NaiveDate::from_ymd_opt(2024, 3, 15)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        )
    }

    #[test]
    fn backoff_doubles_until_cap() {
        let policy = RetryPolicy::new(10, Duration::from_secs(5), Duration::from_secs(30));
        let delays: Vec<u64> = (0..5).map(|a| policy.backoff_delay(a).as_secs()).collect();
        assert_eq!(delays, vec![5, 10, 20, 30, 30]);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(5, Duration::from_secs(5), Duration::from_secs(60));
        let clock = clock();
        let calls = Cell::new(0);
        let mut observed = Vec::new();

        let result = policy
            .run_with(
                &clock,
                || {
                    calls.set(calls.get() + 1);
                    let n = calls.get();
                    async move {
                        if n <= 3 {
                            Err(TestError::Timeout)
                        } else {
                            Ok(n)
                        }
                    }
                },
                classify,
                |retry| observed.push((retry.attempt, retry.delay)),
            )
            .await;

        assert_eq!(result.unwrap(), 4);
        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_secs(5),
                Duration::from_secs(10),
                Duration::from_secs(20)
            ]
        );
        assert_eq!(
            observed,
            vec![
                (1, Duration::from_secs(5)),
                (2, Duration::from_secs(10)),
                (3, Duration::from_secs(20))
            ]
        );
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(1));
        let clock = clock();
        let calls = Cell::new(0);

        let result: Result<(), _> = policy
            .run_with(
                &clock,
                || {
                    calls.set(calls.get() + 1);
                    async { Err(TestError::Denied) }
                },
                classify,
                |_| {},
            )
            .await;

        assert!(matches!(result, Err(RetryError::Fatal(TestError::Denied))));
        assert_eq!(calls.get(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn exhaustion_reports_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(10));
        let clock = clock();

        let result: Result<(), _> = policy
            .run_with(&clock, || async { Err(TestError::Timeout) }, classify, |_| {})
            .await;

        match result {
            Err(RetryError::AttemptsExceeded { error, attempts }) => {
                assert_eq!(error, TestError::Timeout);
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[tokio::test]
    async fn sink_policy_retries_once() {
        let policy = RetryPolicy::for_sink(Duration::ZERO);
        let calls = Cell::new(0);

        let result: Result<(), _> = policy
            .run(
                || {
                    calls.set(calls.get() + 1);
                    async { Err(TestError::Timeout) }
                },
                classify,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 2);
    }
}
