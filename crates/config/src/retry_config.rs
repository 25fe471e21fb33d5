//! Retry and backoff configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff applied to retryable remote failures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per remote call, including the first
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,

    /// Growth factor between consecutive delays
    pub multiplier: f64,

    /// Upper bound on any single delay, in milliseconds
    pub max_delay_ms: u64,

    /// Randomise delays downwards to spread retries
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            multiplier: 2.0,
            max_delay_ms: 10_000,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Delay before the first retry
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Cap on a single delay
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl ConfigSection for RetryConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::in_range(self.max_attempts, 1, 10, "retry.max_attempts"),
            Validator::in_range(self.initial_delay_ms, 1, 60_000, "retry.initial_delay_ms"),
            Validator::in_range(self.multiplier, 1.0, 10.0, "retry.multiplier"),
            Validator::in_range(self.max_delay_ms, 1, 300_000, "retry.max_delay_ms"),
        ];

        if self.max_delay_ms < self.initial_delay_ms {
            results.push(Err(ValidationError::with_value(
                "retry.max_delay_ms",
                "must not be below retry.initial_delay_ms",
                self.max_delay_ms,
            )));
        }

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.max_attempts = other.max_attempts;
        self.initial_delay_ms = other.initial_delay_ms;
        self.multiplier = other.multiplier;
        self.max_delay_ms = other.max_delay_ms;
        self.jitter = other.jitter;
    }

    fn section_name(&self) -> &'static str {
        "retry"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RetryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay(), Duration::from_secs(1));
        assert_eq!(config.max_delay(), Duration::from_secs(10));
    }

    #[test]
    fn test_cap_below_initial_delay() {
        let config = RetryConfig {
            initial_delay_ms: 5000,
            max_delay_ms: 1000,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "retry.max_delay_ms");
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = RetryConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
