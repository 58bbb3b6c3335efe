//! Retry and backoff for artifact fetches.
//!
//! Classifies per-attempt failures (timeouts, throttling, connection errors,
//! short bodies) and decides exponential backoff. Retries never leave the
//! Fetcher: the pipeline driver itself does not retry stages.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::AttemptError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
