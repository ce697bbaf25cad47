use std::time::Duration;

use crate::error::InvocationError;

/// Backoff policy for physical attempts inside one logical call.
///
/// `attempt` is the index of the retry about to happen: 1 before the second
/// physical attempt, 2 before the third, and so on.
pub trait RetryStrategyPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn next_delay(&self, attempt: u32, error: &InvocationError) -> Option<Duration>;
    fn max_attempts(&self) -> u32;
    fn should_retry(&self, attempt: u32, error: &InvocationError) -> bool {
        attempt < self.max_attempts() && !self.is_fatal_error(error)
    }
    fn is_fatal_error(&self, _error: &InvocationError) -> bool {
        false
    }
}

/// Single attempt, no backoff.
pub struct NoRetry;

impl RetryStrategyPlugin for NoRetry {
    fn name(&self) -> &str {
        "none"
    }

    fn next_delay(&self, _attempt: u32, _error: &InvocationError) -> Option<Duration> {
        None
    }

    fn max_attempts(&self) -> u32 {
        1
    }
}
