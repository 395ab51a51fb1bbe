use std::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

use kahani_core::{RetryPolicy, Retryable, retry};

#[derive(Debug, PartialEq)]
enum FakeError {
    Flaky,
    Broken,
}

impl fmt::Display for FakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Retryable for FakeError {
    fn is_retryable(&self) -> bool {
        matches!(self, FakeError::Flaky)
    }
}

#[tokio::test(start_paused = true)]
async fn transient_errors_are_retried_until_success() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy::new(3, 100);

    let out = retry(&policy, "test", || async {
        if calls.fetch_add(1, Ordering::Relaxed) < 2 {
            Err(FakeError::Flaky)
        } else {
            Ok("done")
        }
    })
    .await;

    assert_eq!(out.result, Ok("done"));
    assert_eq!(out.attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_retries() {
    let policy = RetryPolicy::new(2, 100);

    let out: kahani_core::retry::Attempted<(), _> =
        retry(&policy, "test", || async { Err(FakeError::Flaky) }).await;

    assert_eq!(out.result, Err(FakeError::Flaky));
    assert_eq!(out.attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn permanent_errors_fail_immediately() {
    let policy = RetryPolicy::new(5, 100);

    let out: kahani_core::retry::Attempted<(), _> =
        retry(&policy, "test", || async { Err(FakeError::Broken) }).await;

    assert_eq!(out.result, Err(FakeError::Broken));
    assert_eq!(out.attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn waits_follow_the_backoff_schedule() {
    let policy = RetryPolicy::new(3, 200).with_jitter(false);
    let start = tokio::time::Instant::now();

    let out: kahani_core::retry::Attempted<(), _> =
        retry(&policy, "test", || async { Err(FakeError::Flaky) }).await;

    assert_eq!(out.attempts, 4);
    assert_eq!(start.elapsed().as_millis(), 200 + 400 + 800);
}
