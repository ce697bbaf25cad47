//! Task status transition rules.
//!
//! Kept free of timing and I/O so the retry bookkeeping can be tested on its own.

use thiserror::Error;

use super::types::TaskStatus;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
    #[error("Cannot transition from terminal state {state}")]
    FromTerminalState { state: TaskStatus },
}

/// What the dispatcher does with a task after one `Running` period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Complete,
    /// Re-enqueue with the incremented retry count.
    Retry { retry_count: u32 },
    Fail,
}

impl Transition {
    pub fn target(self) -> TaskStatus {
        match self {
            Self::Complete => TaskStatus::Completed,
            Self::Retry { .. } => TaskStatus::Retrying,
            Self::Fail => TaskStatus::Failed,
        }
    }
}

pub struct StateTransition;

impl StateTransition {
    pub fn validate(from: TaskStatus, to: TaskStatus) -> Result<(), TransitionError> {
        if from.is_terminal() {
            return Err(TransitionError::FromTerminalState { state: from });
        }

        let is_valid = matches!(
            (from, to),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
                | (TaskStatus::Running, TaskStatus::Retrying)
                | (TaskStatus::Retrying, TaskStatus::Pending)
        );

        if is_valid {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from, to })
        }
    }

    /// Decide the next state once a run finished.
    pub fn after_run(succeeded: bool, retry_count: u32, max_retries: u32) -> Transition {
        if succeeded {
            Transition::Complete
        } else if retry_count < max_retries {
            Transition::Retry {
                retry_count: retry_count + 1,
            }
        } else {
            Transition::Fail
        }
    }

    pub fn is_terminal(status: TaskStatus) -> bool {
        status.is_terminal()
    }
}
