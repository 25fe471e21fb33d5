// crates/resilience/src/lib.rs
//! Resilience patterns for calls to the remote service
//!
//! This module provides:
//! - Retry with capped exponential backoff
//! - Per-attempt timeout handling
//!
//! # Example
//!
//! ```rust
//! use harbor_resilience::{RetryPolicy, Timeout};
//! use std::time::Duration;
//!
//! // 3 attempts, 1s then 2s between them, never more than 10s
//! let policy = RetryPolicy::default();
//! assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
//! assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
//!
//! let timeout = Timeout::new(Duration::from_secs(30));
//! assert_eq!(timeout.duration(), Duration::from_secs(30));
//! ```

mod error;
mod retry;
mod timeout;

pub use error::{ResilienceError, ResilienceResult};
pub use retry::{retry_async, RetryPolicy};
pub use timeout::{with_timeout, Timeout};
