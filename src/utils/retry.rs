use std::future::Future;
use std::time::Duration;

// ============================================================================
// Transient Failure Retry
// ============================================================================
//
// Backoff for storage calls whose error says it may succeed on a second try
// (an unreachable log or blob backend). Version conflicts are values, not
// errors, so they never reach this layer.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Attempts in total, the first one included
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Growth factor applied to the delay after each failed attempt
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before attempt `attempt + 1`, counting attempts from 1
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        self.initial_delay.mul_f64(factor).min(self.max_delay)
    }
}

/// Errors that may go away if the same call is repeated
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

/// Run `operation` until it succeeds, fails permanently, or runs out of attempts
///
/// The closure receives the 1-based attempt number. The last error is returned
/// unchanged.
pub async fn retry_on_transient<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsTransient,
{
    let mut attempt = 1;
    loop {
        let error = match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Storage call recovered");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !error.is_transient() {
            return Err(error);
        }
        if attempt >= config.max_attempts {
            tracing::error!(attempt, error = %error, "Giving up on storage call");
            return Err(error);
        }

        let delay = config.delay_after(attempt);
        tracing::warn!(attempt, error = %error, delay_ms = delay.as_millis() as u64, "Transient storage failure, backing off");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::StorageError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(8),
            multiplier: 2.0,
        }
    }

    fn unavailable() -> StorageError {
        StorageError::unavailable("event log", "connection refused")
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);

        let result = retry_on_transient(&fast(), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(unavailable())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);

        let result = retry_on_transient(&fast(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(unavailable()) }
        })
        .await;

        assert!(matches!(result, Err(StorageError::Unavailable { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result = retry_on_transient(&fast(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(StorageError::InvalidArgument("bad version".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(StorageError::InvalidArgument(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_grows_and_is_capped() {
        let config = fast();
        assert_eq!(config.delay_after(1), Duration::from_millis(5));
        assert_eq!(config.delay_after(2), Duration::from_millis(8));
        assert_eq!(config.delay_after(10), Duration::from_millis(8));
    }
}
