use thiserror::Error;

/// Errors raised while building a batch in the task store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Duplicate task ID: {0}")]
    DuplicateTask(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),
}

/// Internal dispatcher faults. These are folded into task failures and never
/// escape `process_tasks`.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("worker for task '{task_id}' panicked: {message}")]
    WorkerPanicked { task_id: String, message: String },

    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Recorded on a task that reached `Failed`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error(transparent)]
    Adapter(#[from] super::invocation::AdapterError),

    #[error("{0}")]
    Worker(String),
}

impl TaskError {
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Adapter(e) => e.is_timeout(),
            Self::Worker(_) => false,
        }
    }
}

impl From<DispatchError> for TaskError {
    fn from(err: DispatchError) -> Self {
        Self::Worker(err.to_string())
    }
}
