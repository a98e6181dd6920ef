//! Retry with exponential backoff for flaky remote calls.

use crate::domain::error::YenesisError;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait after the `attempt`-th failure (1-based): backoff * 2^(attempt-1).
    pub fn wait_for(&self, attempt: u32) -> Duration {
        self.backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Run `op` until it succeeds or `policy.retries` attempts have failed.
///
/// `op` receives the 1-based attempt number. Data gaps (`NoData`,
/// `InsufficientData`) are returned immediately since asking again will not
/// produce bars that do not exist.
pub fn retry_with_backoff<T, F>(label: &str, policy: RetryPolicy, mut op: F) -> Result<T, YenesisError>
where
    F: FnMut(u32) -> Result<T, YenesisError>,
{
    let attempts = policy.retries.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_data_gap() => return Err(err),
            Err(err) if attempt >= attempts => {
                tracing::error!("[{}] failed after {} attempts: {}", label, attempts, err);
                return Err(err);
            }
            Err(err) => {
                let wait = policy.wait_for(attempt);
                tracing::warn!(
                    "[{}] attempt {} failed: {}. Retrying in {:?}",
                    label,
                    attempt,
                    err,
                    wait
                );
                thread::sleep(wait);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant() -> RetryPolicy {
        RetryPolicy {
            retries: 3,
            backoff: Duration::ZERO,
        }
    }

    #[test]
    fn waits_double_each_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.wait_for(1), Duration::from_secs(1));
        assert_eq!(policy.wait_for(2), Duration::from_secs(2));
        assert_eq!(policy.wait_for(3), Duration::from_secs(4));
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let mut calls = 0;
        let result = retry_with_backoff("AAPL", instant(), |attempt| {
            calls += 1;
            if attempt < 3 {
                Err(YenesisError::market_data("AAPL", "timeout"))
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn returns_last_error_when_exhausted() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with_backoff("AAPL", instant(), |attempt| {
            calls += 1;
            Err(YenesisError::market_data("AAPL", format!("failure {}", attempt)))
        });
        assert_eq!(calls, 3);
        assert_eq!(
            result.unwrap_err().to_string(),
            "market data error for AAPL: failure 3"
        );
    }

    #[test]
    fn no_data_is_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with_backoff("XYZ", instant(), |_| {
            calls += 1;
            Err(YenesisError::NoData {
                symbol: "XYZ".into(),
            })
        });
        assert!(matches!(result, Err(YenesisError::NoData { .. })));
        assert_eq!(calls, 1);
    }
}
