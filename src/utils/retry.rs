//! Backoff computation shared by the rate limiter and per-client retry loops.

use std::time::Duration;

use rand::Rng;

/// Base delay for the capped exponential backoff.
const BACKOFF_BASE_MS: u64 = 2_000;
/// Upper bound for any single backoff wait.
const BACKOFF_CAP_MS: u64 = 50_000;
/// Maximum random jitter added to each backoff wait.
const BACKOFF_JITTER_MS: u64 = 1_000;

/// Errors that may carry an HTTP status the retry policy can inspect.
pub trait RetryableError {
    /// The HTTP status attached to this error, if any.
    fn retry_status(&self) -> Option<u16>;

    /// Whether the rate limiter should retry this error at all.
    ///
    /// Only 429 (throttled), 503 (unavailable) and 401 (transient auth
    /// hiccups on some providers) are worth another attempt.
    fn is_transient(&self) -> bool {
        matches!(self.retry_status(), Some(429) | Some(503) | Some(401))
    }
}

/// Capped exponential backoff with jitter for the shared rate limiter.
///
/// `min(2^retry_count * 2000 + random(0..1000), 50000)` milliseconds. The
/// jitter is smaller than the gap between consecutive exponents, so the
/// delay is non-decreasing in `retry_count` until it saturates at the cap.
pub fn backoff_delay(retry_count: u32) -> Duration {
    let jitter = rand::thread_rng().gen_range(0..BACKOFF_JITTER_MS);
    let exp = BACKOFF_BASE_MS.saturating_mul(1u64.checked_shl(retry_count).unwrap_or(u64::MAX));
    Duration::from_millis(exp.saturating_add(jitter).min(BACKOFF_CAP_MS))
}

/// Plain exponential delay (`base * 2^attempt`) used by the per-client
/// retry loops that do not add jitter.
pub fn exponential_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
}
