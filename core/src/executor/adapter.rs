use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{AdapterError, InvocationError};

use super::sanitize::{compose_request, sanitize_output, validate_structured};
use super::traits::{ExternalProgram, RetryStrategyPlugin};
use super::types::TaskOutput;

/// What to do after a failed physical attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStep {
    RetryAfter(Duration),
    Exhausted,
}

/// Decides the step after physical attempt number `attempt` (1-based) failed.
pub fn next_step(
    strategy: &dyn RetryStrategyPlugin,
    attempt: u32,
    error: &InvocationError,
) -> AttemptStep {
    if !strategy.should_retry(attempt, error) {
        return AttemptStep::Exhausted;
    }
    match strategy.next_delay(attempt, error) {
        Some(delay) => AttemptStep::RetryAfter(delay),
        None => AttemptStep::Exhausted,
    }
}

/// Performs one logical call: up to `max_attempts` physical invocations of
/// the external program with backoff sleeps in between.
///
/// The backoff sleep runs on the calling worker, which keeps its pool slot
/// for the whole call.
pub struct CallAdapter {
    program: Arc<dyn ExternalProgram>,
    retry: Arc<dyn RetryStrategyPlugin>,
    default_timeout: Duration,
}

impl CallAdapter {
    pub fn new(
        program: Arc<dyn ExternalProgram>,
        retry: Arc<dyn RetryStrategyPlugin>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            program,
            retry,
            default_timeout,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn program_name(&self) -> &str {
        self.program.name()
    }

    pub async fn invoke(
        &self,
        request: &str,
        timeout: Option<Duration>,
        expect_structured: bool,
    ) -> Result<TaskOutput, AdapterError> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let prompt = compose_request(request, expect_structured);
        let max_attempts = self.retry.max_attempts().max(1);

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            tracing::debug!(
                program = self.program.name(),
                prompt_len = prompt.len(),
                timeout_secs = timeout.as_secs_f64(),
                attempt,
                max_attempts,
                "invoking external program"
            );

            let start = Instant::now();
            let outcome = match tokio::time::timeout(timeout, self.program.run(&prompt)).await {
                Ok(res) => res,
                Err(_) => Err(InvocationError::TimeoutExceeded(timeout)),
            };
            tracing::debug!(
                attempt,
                duration_ms = start.elapsed().as_millis() as u64,
                success = outcome.is_ok(),
                "physical attempt finished"
            );

            let err = match outcome {
                Ok(raw) => return Ok(finish_output(&raw, expect_structured)),
                Err(err) => err,
            };

            tracing::warn!(
                "external call failed (attempt {}/{}): {}",
                attempt,
                max_attempts,
                err
            );

            match next_step(self.retry.as_ref(), attempt, &err) {
                AttemptStep::RetryAfter(delay) => {
                    tracing::info!(
                        "retry {}/{} after {}ms",
                        attempt + 1,
                        max_attempts,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                AttemptStep::Exhausted => {
                    tracing::error!("all {} attempts to call the program failed", attempt);
                    return Err(AdapterError::ExhaustedRetries {
                        attempts: attempt,
                        last: err,
                    });
                }
            }
        }
    }
}

fn finish_output(raw: &str, expect_structured: bool) -> TaskOutput {
    let text = sanitize_output(raw);
    if !expect_structured {
        return TaskOutput::text(text);
    }

    match validate_structured(&text) {
        Ok(value) => {
            tracing::debug!("response is valid JSON");
            TaskOutput {
                text,
                structured: Some(value),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "response is not valid JSON, returning raw");
            TaskOutput::text(text)
        }
    }
}
