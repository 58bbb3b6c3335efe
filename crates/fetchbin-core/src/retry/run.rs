//! Retry loop: run a closure until success, a fatal error, or the cap.

use super::classify;
use super::error::AttemptError;
use super::policy::{RetryDecision, RetryPolicy};
use crate::cancel::CancelToken;

/// Runs `f` until it succeeds or the retry policy says to stop. Backoff
/// sleeps are cut short by `cancel`. Returns the last error and the number
/// of attempts made.
pub fn run_with_retry<T, F>(
    policy: &RetryPolicy,
    cancel: &CancelToken,
    mut f: F,
) -> Result<T, (AttemptError, u32)>
where
    F: FnMut(u32) -> Result<T, AttemptError>,
{
    let mut attempt = 1u32;
    loop {
        if cancel.is_cancelled() {
            return Err((AttemptError::Cancelled, attempt));
        }
        match f(attempt) {
            Ok(v) => return Ok(v),
            Err(e) => {
                let kind = classify::classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => return Err((e, attempt)),
                    RetryDecision::RetryAfter(d) => {
                        tracing::warn!(attempt, ?kind, delay_ms = d.as_millis() as u64, "fetch attempt failed: {}", e);
                        if cancel.sleep(d) {
                            return Err((AttemptError::Cancelled, attempt));
                        }
                        attempt += 1;
                    }
                }
            }
        }
    }
}
