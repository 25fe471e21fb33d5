// crates/resilience/tests/resilience_tests.rs
//! Integration tests for resilience patterns

use harbor_resilience::{retry_async, ResilienceError, RetryPolicy, Timeout};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_hung_attempt_times_out_and_is_retried() {
    let policy = RetryPolicy::default();
    let timeout = Timeout::new(Duration::from_secs(30));
    let calls = AtomicUsize::new(0);
    let start = Instant::now();

    let result = retry_async(
        &policy,
        |e: &ResilienceError| matches!(e, ResilienceError::Timeout(_)),
        || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            timeout
                .execute(async move {
                    if n == 1 {
                        // Never answers within the window
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                    }
                    n
                })
                .await
        },
    )
    .await;

    assert_eq!(result, Ok(2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    // 30s timeout plus the first 1s backoff
    assert_eq!(start.elapsed(), Duration::from_secs(31));
}

#[tokio::test(start_paused = true)]
async fn test_backoff_gaps_between_attempts() {
    let policy = RetryPolicy::default();
    let stamps = std::sync::Mutex::new(Vec::new());

    let result: Result<(), String> = retry_async(
        &policy,
        |_| true,
        || async {
            if let Ok(mut guard) = stamps.lock() {
                guard.push(Instant::now());
            }
            Err("unreachable".to_string())
        },
    )
    .await;

    assert!(result.is_err());
    let stamps = stamps.into_inner().unwrap();
    assert_eq!(stamps.len(), 3);
    assert_eq!(stamps[1] - stamps[0], Duration::from_millis(1000));
    assert_eq!(stamps[2] - stamps[1], Duration::from_millis(2000));
}

#[tokio::test(start_paused = true)]
async fn test_custom_policy_respects_cap() {
    let policy = RetryPolicy::new(4)
        .with_initial_delay(Duration::from_millis(500))
        .with_multiplier(4.0)
        .with_max_delay(Duration::from_millis(3000));
    let start = Instant::now();

    let result: Result<(), &str> = retry_async(&policy, |_| true, || async { Err("down") }).await;

    assert_eq!(result, Err("down"));
    // 500 + 2000 + 3000 (capped from 8000)
    assert_eq!(start.elapsed(), Duration::from_millis(5500));
}

#[tokio::test]
async fn test_fast_operation_passes_through_timeout() {
    let timeout = Timeout::default();
    let value = timeout.execute(async { "done" }).await;
    assert_eq!(value, Ok("done"));
}
