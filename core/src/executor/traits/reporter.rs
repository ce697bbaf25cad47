use std::fmt;

use crate::executor::types::BatchSummary;

/// Receives dispatcher lifecycle events for display.
///
/// Called from the dispatcher loop; implementations should return quickly.
pub trait ProgressReporter: Send + Sync {
    fn name(&self) -> &str;
    fn report(&self, event: &ProgressEvent);
}

/// Per-task phase carried by task-level events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Started,
    Retrying,
    Completed,
    Failed,
}

impl TaskPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Retrying => "retrying",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    BatchStart {
        run_id: String,
        total_tasks: usize,
        max_workers: usize,
    },
    TaskStart {
        run_id: String,
        task_id: String,
        task_name: String,
        /// Retries consumed before this run.
        attempt: u32,
    },
    TaskRetry {
        run_id: String,
        task_id: String,
        task_name: String,
        retry_count: u32,
        max_retries: u32,
        error: String,
    },
    TaskComplete {
        run_id: String,
        task_id: String,
        task_name: String,
        success: bool,
        duration_ms: u64,
        retries_used: u32,
        error: Option<String>,
    },
    BatchEnd {
        summary: BatchSummary,
    },
}

impl ProgressEvent {
    /// `(task name, phase)` for task-level events.
    pub fn task_phase(&self) -> Option<(&str, TaskPhase)> {
        match self {
            Self::TaskStart { task_name, .. } => Some((task_name, TaskPhase::Started)),
            Self::TaskRetry { task_name, .. } => Some((task_name, TaskPhase::Retrying)),
            Self::TaskComplete {
                task_name, success, ..
            } => {
                let phase = if *success {
                    TaskPhase::Completed
                } else {
                    TaskPhase::Failed
                };
                Some((task_name, phase))
            }
            Self::BatchStart { .. } | Self::BatchEnd { .. } => None,
        }
    }
}

/// Reporter used when the caller supplies none.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn name(&self) -> &str {
        "noop"
    }

    fn report(&self, _event: &ProgressEvent) {}
}

/// Adapts a plain `(task name, phase)` closure.
pub struct FnProgress<F>(pub F);

impl<F> ProgressReporter for FnProgress<F>
where
    F: Fn(&str, TaskPhase) + Send + Sync,
{
    fn name(&self) -> &str {
        "fn"
    }

    fn report(&self, event: &ProgressEvent) {
        if let Some((task_name, phase)) = event.task_phase() {
            (self.0)(task_name, phase);
        }
    }
}
