use crate::scraper::{ApiError, FetchFailure};
use rand::Rng;
use std::time::{Duration, Instant};

/// Exponential backoff between attempts of one request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random extra sleep added to every backoff.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based), without jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        std::cmp::min(self.base_delay.saturating_mul(factor), self.max_delay)
    }

    fn jittered(&self, retry: u32) -> Duration {
        let base = self.backoff(retry);
        let max_jitter = self.jitter.as_millis() as u64;
        if max_jitter == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=max_jitter))
    }
}

/// Enforces a minimum gap between consecutive requests.
#[derive(Debug)]
pub struct Pacer {
    min_interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// Sleeps until `min_interval` has passed since the previous call.
    /// The first call never sleeps.
    pub fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

/// Pacing plus retry, applied around every upstream call.
#[derive(Debug)]
pub struct RequestPolicy {
    pub retry: RetryPolicy,
    pacer: Pacer,
}

impl RequestPolicy {
    pub fn new(retry: RetryPolicy, min_interval: Duration) -> Self {
        Self {
            retry,
            pacer: Pacer::new(min_interval),
        }
    }

    /// No pacing and no backoff sleeps. Used by tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self::new(
            RetryPolicy {
                max_retries,
                base_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
                jitter: Duration::ZERO,
            },
            Duration::ZERO,
        )
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent.
    pub fn run<T, F>(&mut self, label: &str, mut op: F) -> Result<T, FetchFailure>
    where
        F: FnMut() -> Result<T, ApiError>,
    {
        let max_attempts = self.retry.max_retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.pacer.wait();
            let start = Instant::now();

            match op() {
                Ok(value) => {
                    tracing::debug!(label, attempt, elapsed = ?start.elapsed(), "request succeeded");
                    return Ok(value);
                }
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.jittered(attempt);
                    tracing::warn!(
                        label,
                        attempt,
                        max_attempts,
                        ?delay,
                        %error,
                        "request failed, retrying"
                    );
                    std::thread::sleep(delay);
                }
                Err(error) => {
                    tracing::warn!(label, attempt, %error, "request failed, giving up");
                    return Err(FetchFailure {
                        error,
                        attempts: attempt,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            jitter: Duration::ZERO,
        };
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(4), Duration::from_secs(5));
        assert_eq!(policy.backoff(40), Duration::from_secs(5));
    }

    #[test]
    fn test_transient_errors_are_retried_until_success() {
        let mut policy = RequestPolicy::immediate(3);
        let mut calls = 0;
        let result = policy.run("test", || {
            calls += 1;
            if calls < 3 {
                Err(ApiError::Transient("timeout".into()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result, Ok(3));
    }

    #[test]
    fn test_retry_budget_is_bounded() {
        let mut policy = RequestPolicy::immediate(2);
        let mut calls = 0;
        let result: Result<(), _> = policy.run("test", || {
            calls += 1;
            Err(ApiError::Transient("HTTP 503".into()))
        });
        let failure = result.unwrap_err();
        assert_eq!(calls, 3);
        assert_eq!(failure.attempts, 3);
    }

    #[test]
    fn test_format_errors_are_not_retried() {
        let mut policy = RequestPolicy::immediate(5);
        let mut calls = 0;
        let result: Result<(), _> = policy.run("test", || {
            calls += 1;
            Err(ApiError::UpstreamFormat("code=error".into()))
        });
        assert_eq!(calls, 1);
        assert_eq!(result.unwrap_err().attempts, 1);
    }

    #[test]
    fn test_pacer_enforces_gap() {
        let mut pacer = Pacer::new(Duration::from_millis(30));
        let start = Instant::now();
        pacer.wait();
        pacer.wait();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
