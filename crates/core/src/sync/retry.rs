//! Retry policy for orchestrator-level sync attempts.

use std::time::Duration;

use crate::errors::Error;

/// Bounded exponential backoff with a cap.
///
/// Retries only rate-limit and generic API errors; authentication and
/// not-found failures propagate immediately, and server errors have already
/// consumed their transport-level retries by the time they reach this layer.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Delay before the retry following `attempt` (1-based).
    pub fn delay(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        let scaled = self
            .base_delay
            .saturating_mul(2_u32.saturating_pow(exponent));
        scaled.min(self.max_delay)
    }

    pub fn is_retryable(&self, error: &Error) -> bool {
        match error {
            Error::Api(api) => api.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ApiError, DatabaseError};

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(4));
        assert_eq!(policy.delay(2), Duration::from_secs(8));
        assert_eq!(policy.delay(3), Duration::from_secs(16));
        assert_eq!(policy.delay(10), Duration::from_secs(60));
    }

    #[test]
    fn retries_rate_limit_but_not_auth_or_database() {
        let policy = RetryPolicy::default();
        assert!(policy.is_retryable(&Error::Api(ApiError::RateLimitExceeded("slow".into()))));
        assert!(!policy.is_retryable(&Error::Api(ApiError::Authentication("bad".into()))));
        assert!(!policy.is_retryable(&Error::Database(DatabaseError::Internal("io".into()))));
    }
}
