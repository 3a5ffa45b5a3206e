use crate::transport::TransportConfig;
use crate::Error;
use std::time::Duration;

/// Internal decision for how to proceed after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    Retry { delay: Duration },
    Fail,
}

/// Retry policy shared by the unary path and the connection phase of streams.
///
/// Keep this deterministic: no jitter, no adaptive heuristics.
#[derive(Debug, Clone)]
pub(crate) struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &TransportConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.backoff_base,
            max_delay: config.backoff_max.max(config.backoff_base),
        }
    }

    /// `base * 2^attempt`, or the server's `Retry-After`, capped at `max_delay`.
    pub fn backoff_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exponential = {
            let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
            self.base_delay.saturating_mul(factor)
        };
        retry_after.unwrap_or(exponential).min(self.max_delay)
    }

    /// Decide what to do after a failed attempt.
    ///
    /// `attempt` is 0-based (first failure => attempt=0). `retry_allowed` is
    /// the request's own opt-in; non-idempotent calls clear it.
    pub fn decide(&self, err: &Error, attempt: u32, retry_allowed: bool) -> Decision {
        if !retry_allowed || attempt >= self.max_retries || !err.is_retryable() {
            return Decision::Fail;
        }
        let retry_after = err.api().and_then(|api| api.retry_after);
        Decision::Retry {
            delay: self.backoff_delay(attempt, retry_after),
        }
    }
}
