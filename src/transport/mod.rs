//! HTTP transport shared by every source adapter.
//!
//! - [`HttpClient`] - reqwest wrapper mapping failures into [`FetchError`]
//! - [`RetryPolicy`] / [`classify_error`] - exponential backoff for transient failures
//! - [`Throttle`] - per-host spacing between navigations for scrape sources

mod client;
mod error;
mod retry;
pub mod throttle;

pub use client::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS, HttpClient, HttpTimeouts};
pub use error::FetchError;
pub use retry::{DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error};
pub use throttle::{DEFAULT_THROTTLE_DELAY, Throttle, extract_host, parse_retry_after};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, FetchError>` explicitly in function signatures.
