//! Per-stage retry with exponential backoff.
//!
//! The delay before retry `n` is `min(initial_backoff_ms * 2^n, max_delay_ms)`.
//! With jitter it is drawn from the upper half of that delay, so the cap
//! always holds. Errors decide for themselves
//! whether another attempt makes sense through [`Retryable`].

use std::{
    fmt::Display,
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio_retry2::{Retry, RetryError, strategy::jitter};
use tracing::{debug, warn};

/// Classifies an error as transient (worth retrying) or permanent.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 1000,
            max_delay_ms: 30_000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            ..Self::default()
        }
    }

    /// A policy that runs the operation exactly once.
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Delay before retry `n` (0-based), without jitter.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// The full schedule of waits, one per allowed retry.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let policy = *self;
        (0..policy.max_retries).map(move |n| {
            let d = policy.delay_for(n);
            if policy.jitter { half_jitter(d) } else { d }
        })
    }
}

/// Uniform in `[d/2, d]`. `jitter` scales by `[0.5, 1.5)`, so `d/2` comes
/// back in `[d/4, 3d/4)` and is shifted up by `d/4`.
fn half_jitter(d: Duration) -> Duration {
    (d / 4 + jitter(d / 2)).min(d)
}

/// Result of a retried operation together with how many attempts it took.
#[derive(Debug)]
pub struct Attempted<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

/// Runs `op` under `policy`. Transient errors are retried until the policy
/// is exhausted; permanent errors return immediately.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, stage: &str, mut op: F) -> Attempted<T, E>
where
    E: Retryable + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = AtomicU32::new(0);

    let result = Retry::spawn(policy.delays(), || {
        let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
        let fut = op();
        async move {
            match fut.await {
                Ok(value) => {
                    debug!(stage, attempt, "attempt succeeded");
                    Ok(value)
                }
                Err(err) if err.is_retryable() => {
                    warn!(stage, attempt, error = %err, "transient failure");
                    Err(RetryError::Transient {
                        err,
                        retry_after: None,
                    })
                }
                Err(err) => {
                    warn!(stage, attempt, error = %err, "permanent failure");
                    Err(RetryError::Permanent(err))
                }
            }
        }
    })
    .await;

    Attempted {
        result,
        attempts: attempts.load(Ordering::Relaxed),
    }
}
