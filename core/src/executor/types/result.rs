use serde::Serialize;

use crate::error::TaskError;

/// Sanitized output of a completed task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutput {
    /// Response text with any fenced block unwrapped.
    pub text: String,

    /// Parsed value, present only when structured output was requested and
    /// the text validated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<serde_json::Value>,
}

impl TaskOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            structured: None,
        }
    }
}

/// Final state handed to a task's completion hook.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Completed(TaskOutput),
    Failed(TaskError),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Counters for one `process_tasks` run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub run_id: String,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Re-submissions caused by task-level retries.
    pub retries: usize,
    pub duration_ms: u64,
}
