//! Bounded retry with increasing backoff for transient model faults.
//!
//! Two distinct failure classes reach the pipeline: infrastructure hiccups
//! (the provider answered 5xx) and generation variance (the transport
//! worked, the text is garbage). This module handles only the first. The
//! second is a separate policy owned by the generator, which resubmits the
//! identical prompt on parse failure.

use std::time::Duration;

use super::LlmError;

/// Retry policy for transient model-service faults.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of invocations of the operation, the first included.
    pub max_attempts: u32,
    /// Base backoff; failed attempt `n` waits `base_delay * n` before the
    /// next try, so the delay grows strictly per retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy with no backoff delay, for tests and local services.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    /// Backoff to wait after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Run `operation`, retrying transient faults with increasing backoff.
///
/// The operation is invoked at most `policy.max_attempts` times. Only
/// errors classified transient by [`LlmError::is_transient`] are retried;
/// any other failure, or exhaustion of attempts, propagates immediately.
/// Nothing is swallowed in this layer.
pub fn with_retry<T, F>(policy: RetryPolicy, mut operation: F) -> Result<T, LlmError>
where
    F: FnMut() -> Result<T, LlmError>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(attempt, ?delay, "transient model fault, retrying: {err}");
                std::thread::sleep(delay);
            }
            Err(err) => return Err(err),
        }
    }
}
