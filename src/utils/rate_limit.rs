//! Queue-style rate limiter serializing outbound API calls per identity.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use super::retry::{backoff_delay, RetryableError};

/// Cooldown between queue entries so a busy caller cannot monopolize the
/// limiter the moment its own task settles.
const QUEUE_COOLDOWN: Duration = Duration::from_millis(100);

/// Serializes and throttles outbound calls to an external API.
///
/// All scheduled tasks share one FIFO queue (the fair async mutex) and run
/// one at a time, but the minimum spacing of `60000 / requests_per_minute`
/// milliseconds is tracked per identity key. Two calls against the same
/// identity therefore never violate its per-minute cap, while calls against
/// different identities still serialize globally.
#[derive(Debug)]
pub struct RateLimiter {
    requests_per_minute: u32,
    max_retries: u32,
    state: Mutex<LimiterState>,
}

#[derive(Debug, Default)]
struct LimiterState {
    last_request: HashMap<String, Instant>,
}

impl RateLimiter {
    /// Create a limiter enforcing `requests_per_minute` per identity and
    /// retrying transient failures up to `max_retries` times.
    pub fn new(requests_per_minute: u32, max_retries: u32) -> Self {
        Self {
            requests_per_minute: requests_per_minute.max(1),
            max_retries,
            state: Mutex::new(LimiterState::default()),
        }
    }

    fn min_gap(&self) -> Duration {
        Duration::from_millis(60_000 / u64::from(self.requests_per_minute))
    }

    /// Run `task` once the identity's per-minute budget allows it.
    ///
    /// `task` is invoked once per attempt; transient failures (HTTP 429,
    /// 503, 401) are retried with capped exponential backoff. Any other
    /// error, or exhausted retries, propagates to the caller. Tasks execute
    /// strictly in enqueue order; the queue head holds the limiter for the
    /// duration of its waits, its attempts and a short cooldown.
    pub async fn schedule<T, E, F, Fut>(&self, identity: &str, mut task: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + Display,
    {
        // tokio's Mutex grants the lock in FIFO order, which is the queue.
        let mut state = self.state.lock().await;

        if let Some(last) = state.last_request.get(identity) {
            let elapsed = last.elapsed();
            let min_gap = self.min_gap();
            if elapsed < min_gap {
                sleep(min_gap - elapsed).await;
            }
        }

        let result = self.execute_with_retry(identity, &mut task).await;
        if result.is_ok() {
            state.last_request.insert(identity.to_string(), Instant::now());
        }

        sleep(QUEUE_COOLDOWN).await;
        result
    }

    async fn execute_with_retry<T, E, F, Fut>(&self, identity: &str, task: &mut F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + Display,
    {
        let mut retry_count = 0u32;
        loop {
            match task().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && retry_count < self.max_retries => {
                    let backoff = backoff_delay(retry_count);
                    tracing::warn!(
                        identity,
                        status = err.retry_status(),
                        "API error, retrying in {:.1}s",
                        backoff.as_secs_f64()
                    );
                    sleep(backoff).await;
                    retry_count += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
