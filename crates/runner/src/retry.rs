use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::RetryConfig;

/// Bounded exponential-backoff retry loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    min_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
}

/// What a retried operation ended with.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    /// Attempts actually made, including the successful one.
    pub attempts: u32,
    /// The last error was retryable but the attempt budget ran out.
    pub exhausted: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, min_backoff: Duration, max_backoff: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            min_backoff,
            max_backoff: max_backoff.max(min_backoff),
            multiplier,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.min_backoff(),
            config.max_backoff(),
            config.multiplier,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after attempt `attempt` (1-based) has failed.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let secs = self.multiplier * 2f64.powi(exponent);
        let raw = Duration::try_from_secs_f64(secs).unwrap_or(self.max_backoff);
        raw.max(self.min_backoff).min(self.max_backoff)
    }

    /// Runs `f` until it succeeds, fails with an error `should_retry`
    /// rejects, or the attempt budget is spent. `f` gets the 1-based
    /// attempt number. Attempts never overlap.
    pub async fn retry_if<F, Fut, T, E, P>(
        &self,
        operation_name: &str,
        should_retry: P,
        mut f: F,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match f(attempt).await {
                Ok(result) => {
                    if attempt > 1 {
                        info!(
                            operation = operation_name,
                            attempts = attempt,
                            "Operation succeeded after retries"
                        );
                    }
                    return RetryOutcome {
                        result: Ok(result),
                        attempts: attempt,
                        exhausted: false,
                    };
                }
                Err(e) if !should_retry(&e) => {
                    return RetryOutcome {
                        result: Err(e),
                        attempts: attempt,
                        exhausted: false,
                    };
                }
                Err(e) => {
                    if attempt >= self.max_attempts {
                        warn!(
                            operation = operation_name,
                            attempts = attempt,
                            error = %e,
                            "Operation failed after max attempts"
                        );
                        return RetryOutcome {
                            result: Err(e),
                            attempts: attempt,
                            exhausted: true,
                        };
                    }

                    let backoff = self.backoff_for(attempt);
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Operation failed, retrying"
                    );

                    sleep(backoff).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::from_config(&RetryConfig::immediate(max_attempts))
    }

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.backoff_for(1), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(4), Duration::from_secs(8));
        assert_eq!(policy.backoff_for(5), Duration::from_secs(10));
        assert_eq!(policy.backoff_for(40), Duration::from_secs(10));
    }

    #[test]
    fn test_schedule_with_larger_multiplier() {
        let policy = RetryPolicy::new(5, Duration::from_secs(4), Duration::from_secs(10), 3.0);
        assert_eq!(policy.backoff_for(1), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(6));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let outcome = fast(3)
            .retry_if("flaky", |_: &String| true, |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(format!("attempt {attempt} timed out"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(outcome.result.unwrap(), 3);
        assert_eq!(outcome.attempts, 3);
        assert!(!outcome.exhausted);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_budget() {
        let outcome = fast(3)
            .retry_if("down", |_: &&str| true, |_| async { Err::<(), _>("503") })
            .await;

        assert_eq!(outcome.attempts, 3);
        assert!(outcome.exhausted);
        assert_eq!(outcome.result.unwrap_err(), "503");
    }

    #[tokio::test]
    async fn test_non_retryable_stops_immediately() {
        let outcome = fast(3)
            .retry_if("bad input", |e: &&str| *e != "malformed", |_| async {
                Err::<(), _>("malformed")
            })
            .await;

        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.exhausted);
    }
}
