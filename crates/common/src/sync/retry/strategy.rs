// Retry strategy with exponential backoff and jitter
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::{CommonError, CommonResult, ErrorClassification};
use crate::sync::retry::constants::{
    DEFAULT_BASE_DELAY, DEFAULT_JITTER_FACTOR, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY,
    MAX_BACKOFF_EXPONENT, MAX_MAX_ATTEMPTS, MIN_MAX_ATTEMPTS,
};

/// Retry strategy with configurable exponential backoff and jitter
///
/// The delay before retry `n` (0-based) is `base_delay * 2^n`, capped at
/// `max_delay`, then spread by `±jitter_factor/2`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryStrategy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl RetryStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a custom retry strategy with validation
    pub fn custom(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
    ) -> CommonResult<Self> {
        if base_delay > max_delay {
            return Err(CommonError::config_field(
                "base_delay",
                format!("{base_delay:?} cannot be greater than max_delay ({max_delay:?})"),
            ));
        }

        Self { base_delay, max_delay, ..Self::default() }.with_max_attempts(max_attempts)
    }

    /// Set the maximum number of attempts with validation
    pub fn with_max_attempts(mut self, attempts: u32) -> CommonResult<Self> {
        if !(MIN_MAX_ATTEMPTS..=MAX_MAX_ATTEMPTS).contains(&attempts) {
            return Err(CommonError::config_field(
                "max_attempts",
                format!(
                    "must be between {MIN_MAX_ATTEMPTS} and {MAX_MAX_ATTEMPTS}, got {attempts}"
                ),
            ));
        }
        self.max_attempts = attempts;
        Ok(self)
    }

    /// Set the base delay for exponential backoff
    pub fn with_base_delay(mut self, delay: Duration) -> CommonResult<Self> {
        if delay > self.max_delay {
            return Err(CommonError::config_field(
                "base_delay",
                format!("{delay:?} cannot be greater than max_delay ({:?})", self.max_delay),
            ));
        }
        self.base_delay = delay;
        Ok(self)
    }

    /// Set the maximum delay cap
    pub fn with_max_delay(mut self, delay: Duration) -> CommonResult<Self> {
        if delay < self.base_delay {
            return Err(CommonError::config_field(
                "max_delay",
                format!("{delay:?} cannot be less than base_delay ({:?})", self.base_delay),
            ));
        }
        self.max_delay = delay;
        Ok(self)
    }

    /// Set the jitter factor (0.0 = no jitter, 1.0 = full jitter)
    #[must_use]
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn get_delay(&self, attempt: u32) -> Duration {
        self.apply_jitter(self.exponential_delay(attempt))
    }

    /// Exponential delay without jitter
    pub fn exponential_delay(&self, attempt: u32) -> Duration {
        let base_millis = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let max_millis = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);

        let exponent = attempt.min(MAX_BACKOFF_EXPONENT);
        let multiplier = 2_u64.saturating_pow(exponent);
        let delay_millis = base_millis.saturating_mul(multiplier).min(max_millis);

        Duration::from_millis(delay_millis)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor == 0.0 {
            return delay;
        }

        let mut rng = rand::thread_rng();
        let delay_millis = delay.as_millis() as f64;
        let jitter_range = delay_millis * self.jitter_factor;

        let jitter = rng.gen_range(-jitter_range / 2.0..=jitter_range / 2.0);
        let final_millis = (delay_millis + jitter).max(0.0) as u64;

        Duration::from_millis(final_millis).min(self.max_delay)
    }

    /// Whether another attempt is allowed after `attempt` failed ones
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or runs out of attempts. The last error is returned unchanged.
    pub async fn execute<F, Fut, T, E>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ErrorClassification + std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation = operation_name, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    attempt += 1;
                    if !err.is_retryable() || !self.should_retry(attempt) {
                        warn!(operation = operation_name, attempt, error = %err, "giving up");
                        return Err(err);
                    }

                    let delay = self.get_delay(attempt - 1);
                    debug!(
                        operation = operation_name,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn exponential_delay_doubles_and_caps() {
        let strategy = RetryStrategy::custom(5, Duration::from_secs(1), Duration::from_secs(10))
            .unwrap()
            .with_jitter_factor(0.0);

        assert_eq!(strategy.get_delay(0), Duration::from_secs(1));
        assert_eq!(strategy.get_delay(1), Duration::from_secs(2));
        assert_eq!(strategy.get_delay(3), Duration::from_secs(8));
        assert_eq!(strategy.get_delay(4), Duration::from_secs(10));
        assert_eq!(strategy.get_delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let strategy = RetryStrategy::custom(5, Duration::from_secs(4), Duration::from_secs(60))
            .unwrap()
            .with_jitter_factor(0.5);

        for _ in 0..100 {
            let delay = strategy.get_delay(0);
            assert!(delay >= Duration::from_secs(3));
            assert!(delay <= Duration::from_secs(5));
        }
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        assert!(RetryStrategy::new().with_max_attempts(0).is_err());
        assert!(RetryStrategy::new().with_max_attempts(101).is_err());
        assert!(RetryStrategy::custom(3, Duration::from_secs(10), Duration::from_secs(1)).is_err());
        assert_eq!(RetryStrategy::new().with_jitter_factor(3.0).jitter_factor, 1.0);
    }

    #[test]
    fn should_retry_counts_failed_attempts() {
        let strategy = RetryStrategy::new().with_max_attempts(2).unwrap();
        assert!(strategy.should_retry(1));
        assert!(!strategy.should_retry(2));
    }

    #[tokio::test(start_paused = true)]
    async fn execute_retries_transient_errors() {
        let strategy =
            RetryStrategy::custom(3, Duration::from_millis(10), Duration::from_millis(50))
                .unwrap()
                .with_jitter_factor(0.0);
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let result = strategy
            .execute("fetch", || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(CommonError::backend("supabase", "503", true))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn execute_stops_on_permanent_errors() {
        let strategy = RetryStrategy::new();
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let result: Result<(), CommonError> = strategy
            .execute("fetch", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(CommonError::backend("supabase", "400", false)) }
            })
            .await;

        assert!(matches!(result, Err(CommonError::Backend { retryable: false, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn execute_returns_last_error_when_attempts_run_out() {
        let strategy = RetryStrategy::custom(2, Duration::from_millis(5), Duration::from_millis(5))
            .unwrap()
            .with_jitter_factor(0.0);
        let calls = AtomicU32::new(0);

        let result: Result<(), CommonError> = strategy
            .execute("probe", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(CommonError::timeout(format!("attempt {n}"), Duration::ZERO)) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(result.unwrap_err().to_string().starts_with("attempt 1"));
    }
}
