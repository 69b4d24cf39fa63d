//! Shared utilities: HTTP client defaults, rate limiting, retry backoff
//! and cross-source deduplication.

pub mod dedup;
pub mod http;
pub mod rate_limit;
pub mod retry;

pub use dedup::dedupe_by_title;
pub use http::HttpClient;
pub use rate_limit::RateLimiter;
pub use retry::{backoff_delay, exponential_delay, RetryableError};
