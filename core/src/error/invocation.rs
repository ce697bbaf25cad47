use std::time::Duration;

use thiserror::Error;

/// Failure of one physical invocation of the external program.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    #[error("timed out after {}s", .0.as_secs_f64())]
    TimeoutExceeded(Duration),

    #[error("program exited with code {code:?}: {stderr}")]
    InvocationFailed { code: Option<i32>, stderr: String },

    #[error("spawn failed: {0}")]
    Spawn(String),
}

impl InvocationError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimeoutExceeded(_))
    }
}

/// Failure of one logical call, after the adapter used up its physical attempts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("{}", exhausted_message(.attempts, .last))]
    ExhaustedRetries {
        attempts: u32,
        last: InvocationError,
    },
}

impl AdapterError {
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::ExhaustedRetries { last, .. } => last.is_timeout(),
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::ExhaustedRetries { attempts, .. } => *attempts,
        }
    }
}

fn exhausted_message(attempts: &u32, last: &InvocationError) -> String {
    match last {
        InvocationError::TimeoutExceeded(timeout) => format!(
            "call timed out after {} seconds (tried {} times)",
            timeout.as_secs(),
            attempts
        ),
        other => format!("call failed after {} attempts: {}", attempts, other),
    }
}
