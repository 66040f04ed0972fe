//! Retry logic with fixed delay for transient failures
//!
//! This module provides utilities to retry operations that may fail due to
//! transient network issues or temporary appliance unavailability.
//!
//! The delay between attempts is fixed rather than exponential: each target's
//! retries run on its own worker inside a small bounded pool, so one target
//! sleeping between attempts never blocks another target's progress.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::logger;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the initial attempt)
    pub max_retries: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Create a configuration with no retries (fail fast)
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::from_millis(0),
        }
    }
}

/// Retry an async operation with a fixed inter-attempt delay
///
/// Returns the first `Ok` result, or the last error once `max_retries + 1`
/// total attempts have been made. Errors for which `is_retryable` returns
/// false are returned immediately without further attempts.
///
/// # Arguments
///
/// * `config` - Retry configuration
/// * `operation` - Async closure that returns Result<T, E>
/// * `is_retryable` - Function to determine if an error is worth retrying
pub async fn retry_with_fixed_delay<T, E, F, Fut, P>(
    config: &RetryConfig,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                attempt += 1;

                // Exhausted retries, or the error is deterministic
                if attempt > config.max_retries || !is_retryable(&err) {
                    return Err(err);
                }

                logger::log_warn(&format!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}...",
                    attempt,
                    config.max_retries + 1,
                    err,
                    config.delay
                ));

                sleep(config.delay).await;
            }
        }
    }
}
